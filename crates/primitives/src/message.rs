//! The identity shared by every cross-domain message.

use alloy_primitives::{Bytes, B256};
use core::fmt::{self, Debug, Display};

/// Where a cross-domain message was observed on its origin chain.
///
/// Immutable once the message has been decoded from a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MessageOrigin {
    /// The origin chain transaction that emitted the message.
    pub tx_hash: B256,
    /// The origin chain block containing that transaction.
    pub block_hash: B256,
    /// The number of that block.
    pub block_number: u64,
    /// The sequence number assigned to the message by the origin chain: the delayed inbox
    /// message index for parent-to-child messages, the send position for child-to-parent ones.
    pub sequence_number: u64,
}

impl MessageOrigin {
    /// The identity of the message.
    pub const fn id(&self) -> MessageId {
        MessageId { origin_tx_hash: self.tx_hash, sequence_number: self.sequence_number }
    }
}

/// The identity of a cross-domain message: the transaction that created it and the sequence
/// number the origin chain assigned to it.
///
/// Every failure reported for a message carries this, so a failed message can always be located
/// for manual remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MessageId {
    /// The origin chain transaction hash.
    pub origin_tx_hash: B256,
    /// The sequence number of the message.
    pub sequence_number: u64,
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin_tx_hash, self.sequence_number)
    }
}

/// A lifecycle status of a cross-domain message.
pub trait MessageStatus: Debug + Display + Copy + Eq + Send + Sync + 'static {
    /// Whether no further transition is defined from this status.
    fn is_terminal(&self) -> bool;

    /// The position of the status along the lifecycle. A message never moves to a status of a
    /// lower rank; observing one means the chain reorganised underneath the caller.
    fn rank(&self) -> u8;
}

/// A message created on one chain and consumed on the other.
pub trait CrossDomainMessage: Debug + Clone + Send + Sync {
    /// The lifecycle of the message.
    type Status: MessageStatus;

    /// Where the message was observed on its origin chain.
    fn origin(&self) -> &MessageOrigin;

    /// The calldata carried by the message.
    fn payload(&self) -> &Bytes;

    /// The identity of the message.
    fn id(&self) -> MessageId {
        self.origin().id()
    }
}
