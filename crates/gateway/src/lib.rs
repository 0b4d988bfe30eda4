#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod errors;
pub use errors::{GatewayError, GatewayResult};

mod params;
pub use params::RetryableGasParams;

mod resolver;
pub use resolver::TokenGatewayResolver;

mod coordinator;
pub use coordinator::{
    GatewaySetCoordinator, RegistrationParams, RegistrationState, TwoMessageRegistration,
};

mod bridger;
pub use bridger::Erc20Bridger;
