#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod errors;
pub use errors::{PollError, ProviderError, ProviderResult};

mod filter;
pub use filter::{BlockTag, FilteredLog, LogFilter};

mod traits;
pub use traits::{ChainProvider, ChainSigner};

mod logs;
pub use logs::{fetch_logs, LogQueryConfig};

mod poll;
pub use poll::{poll_until, PollConfig};

mod pending;
pub use pending::PendingTransaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
