//! The chain pair a bridge operates over.

use nitro_bridge_primitives::L2Network;
use nitro_bridge_providers::LogQueryConfig;
use std::sync::Arc;

/// The parent and child chain providers of one bridge, with the network they serve.
#[derive(Debug, Clone)]
pub struct BridgeProviders<L1, L2> {
    /// The parent chain.
    pub l1: L1,
    /// The child chain.
    pub l2: L2,
    /// The contracts and parameters of the bridge.
    pub network: Arc<L2Network>,
    /// Bounds every paginated log scan.
    pub log_query: LogQueryConfig,
}

impl<L1, L2> BridgeProviders<L1, L2> {
    /// Creates the provider pair with the default log query bounds.
    pub fn new(l1: L1, l2: L2, network: L2Network) -> Self {
        Self { l1, l2, network: Arc::new(network), log_query: LogQueryConfig::default() }
    }

    /// Sets the log query bounds.
    pub fn with_log_query(mut self, log_query: LogQueryConfig) -> Self {
        self.log_query = log_query;
        self
    }
}
