//! ERC-20 balance books.

use crate::ExecutionError;
use alloy_primitives::{Address, U256};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub(crate) struct Erc20 {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl Erc20 {
    pub(crate) fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub(crate) fn mint(&mut self, to: Address, amount: U256) {
        *self.balances.entry(to).or_default() += amount;
    }

    pub(crate) fn burn(&mut self, from: Address, amount: U256) -> Result<(), ExecutionError> {
        let balance = self.balances.entry(from).or_default();
        if *balance < amount {
            return Err(ExecutionError::revert("ERC20: burn amount exceeds balance"));
        }
        *balance -= amount;
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), ExecutionError> {
        let balance = self.balances.entry(from).or_default();
        if *balance < amount {
            return Err(ExecutionError::revert("ERC20: transfer amount exceeds balance"));
        }
        *balance -= amount;
        self.mint(to, amount);
        Ok(())
    }

    pub(crate) fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    /// Moves `amount` from `owner` to `spender` out of the allowance `owner` granted `spender`.
    pub(crate) fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        amount: U256,
    ) -> Result<(), ExecutionError> {
        let allowance = self.allowances.get(&(owner, spender)).copied().unwrap_or_default();
        if allowance < amount {
            return Err(ExecutionError::revert("ERC20: insufficient allowance"));
        }
        self.transfer(owner, spender, amount)?;
        self.allowances.insert((owner, spender), allowance - amount);
        Ok(())
    }
}
