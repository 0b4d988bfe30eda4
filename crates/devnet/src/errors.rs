//! Execution failures of simulated contracts.

use alloy_primitives::Bytes;
use alloy_sol_types::{Revert, SolError};
use nitro_bridge_providers::ProviderError;
use thiserror::Error;

/// A simulated call or transaction reverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Reverted with an `Error(string)` reason.
    #[error("Reverted: {0}")]
    Reason(String),
    /// Reverted with ABI encoded custom error data.
    #[error("Reverted with custom error {0}")]
    Custom(Bytes),
}

impl ExecutionError {
    pub(crate) fn revert(reason: impl Into<String>) -> Self {
        Self::Reason(reason.into())
    }

    pub(crate) fn custom<E: SolError>(error: E) -> Self {
        Self::Custom(error.abi_encode().into())
    }

    /// The revert data a node would return.
    pub fn revert_data(&self) -> Bytes {
        match self {
            Self::Reason(reason) => Revert { reason: reason.clone() }.abi_encode().into(),
            Self::Custom(data) => data.clone(),
        }
    }
}

impl From<alloy_sol_types::Error> for ExecutionError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Reason(format!("bad calldata: {err}"))
    }
}

impl From<ExecutionError> for ProviderError {
    fn from(err: ExecutionError) -> Self {
        Self::Reverted(err.revert_data())
    }
}

/// A [Result] alias for the [ExecutionError] type.
pub type ExecutionResult<T> = core::result::Result<T, ExecutionError>;
