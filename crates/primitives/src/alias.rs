//! Parent chain to child chain address aliasing.
//!
//! When a parent chain contract sends a message, the child chain sees the sender shifted by
//! [ADDRESS_ALIAS_OFFSET] so it can never collide with an externally owned account on the child
//! chain.

use crate::ADDRESS_ALIAS_OFFSET;
use alloy_primitives::{aliases::U160, Address};

/// Applies the parent-to-child alias to `address`.
pub fn apply_l1_to_l2_alias(address: Address) -> Address {
    let shifted = to_u160(address).wrapping_add(to_u160(ADDRESS_ALIAS_OFFSET));
    Address::from(shifted.to_be_bytes::<20>())
}

/// Reverts [apply_l1_to_l2_alias].
pub fn undo_l1_to_l2_alias(address: Address) -> Address {
    let shifted = to_u160(address).wrapping_sub(to_u160(ADDRESS_ALIAS_OFFSET));
    Address::from(shifted.to_be_bytes::<20>())
}

fn to_u160(address: Address) -> U160 {
    U160::from_be_bytes::<20>(address.0 .0)
}
