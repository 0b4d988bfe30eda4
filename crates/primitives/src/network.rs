//! Static description of a parent/child chain pair and its bridge deployments.

use alloy_primitives::{keccak256, Address, B256};

/// The core contracts of the rollup, all deployed on the parent chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EthBridge {
    /// The bridge recording every delayed inbox message.
    pub bridge: Address,
    /// The delayed inbox.
    pub inbox: Address,
    /// The outbox executing child-to-parent messages.
    pub outbox: Address,
    /// The rollup contract holding assertions.
    pub rollup: Address,
}

/// The token bridge contracts on both chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TokenBridge {
    /// The gateway router on the parent chain.
    pub l1_gateway_router: Address,
    /// The gateway router on the child chain.
    pub l2_gateway_router: Address,
    /// The standard (default) gateway on the parent chain.
    pub l1_erc20_gateway: Address,
    /// The standard (default) gateway on the child chain.
    pub l2_erc20_gateway: Address,
    /// The custom gateway on the parent chain.
    pub l1_custom_gateway: Address,
    /// The custom gateway on the child chain.
    pub l2_custom_gateway: Address,
    /// The beacon proxy factory deploying standard tokens on the child chain.
    pub l2_beacon_proxy_factory: Address,
    /// The init code hash of the cloneable proxy deployed for standard tokens.
    pub cloneable_proxy_hash: B256,
}

/// A child chain and the bridge deployments connecting it to its parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct L2Network {
    /// Human readable name.
    pub name: String,
    /// The chain id of the child chain.
    pub chain_id: u64,
    /// The chain id of the parent chain.
    pub parent_chain_id: u64,
    /// The rollup core contracts.
    pub eth_bridge: EthBridge,
    /// The token bridge contracts.
    pub token_bridge: TokenBridge,
    /// The lifetime of a retryable ticket before it expires, in seconds.
    #[cfg_attr(feature = "serde", serde(default = "default_retryable_lifetime"))]
    pub retryable_lifetime_seconds: u64,
    /// The number of parent chain blocks after which an unconfirmed child-to-parent message is
    /// reported as expired. `None` disables expiry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub outbox_expiry_blocks: Option<u64>,
}

#[cfg(feature = "serde")]
const fn default_retryable_lifetime() -> u64 {
    crate::DEFAULT_RETRYABLE_LIFETIME_SECONDS
}

impl L2Network {
    /// Whether `gateway` is one of the standard gateways of this network.
    pub fn is_standard_gateway(&self, gateway: Address) -> bool {
        gateway == self.token_bridge.l1_erc20_gateway
            || gateway == self.token_bridge.l2_erc20_gateway
    }

    /// Whether `gateway` is one of the custom gateways of this network.
    pub fn is_custom_gateway(&self, gateway: Address) -> bool {
        gateway == self.token_bridge.l1_custom_gateway
            || gateway == self.token_bridge.l2_custom_gateway
    }

    /// The child chain address of the standard token bridged from `l1_token`.
    ///
    /// Standard tokens are beacon proxies deployed with CREATE2 by the proxy factory, salted with
    /// `keccak256(abi.encode(l2Erc20Gateway, keccak256(abi.encode(l1Token))))`.
    pub fn standard_l2_token_address(&self, l1_token: Address) -> Address {
        let user_salt = keccak256(l1_token.into_word());
        let mut salt_preimage = [0u8; 64];
        let gateway = self.token_bridge.l2_erc20_gateway.into_word();
        salt_preimage[..32].copy_from_slice(gateway.as_slice());
        salt_preimage[32..].copy_from_slice(user_salt.as_slice());
        let salt = keccak256(salt_preimage);
        self.token_bridge
            .l2_beacon_proxy_factory
            .create2(salt.0, self.token_bridge.cloneable_proxy_hash.0)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_deserialize_network() {
        let raw = r#"{
    "name": "local",
    "chainId": 412346,
    "parentChainId": 1337,
    "ethBridge": {
        "bridge": "0x5eCF728ffC5C5E802091875f96281B5aeECf6C49",
        "inbox": "0x9f8c1c641336A371031499e3c362e40d58d0f254",
        "outbox": "0x50143333b44Ea46255BEb67255C9Afd35551072F",
        "rollup": "0x46966d871d29e1772c2809459469f849d8AAb1A3"
    },
    "tokenBridge": {
        "l1GatewayRouter": "0x1111111111111111111111111111111111111111",
        "l2GatewayRouter": "0x2222222222222222222222222222222222222222",
        "l1Erc20Gateway": "0x3333333333333333333333333333333333333333",
        "l2Erc20Gateway": "0x4444444444444444444444444444444444444444",
        "l1CustomGateway": "0x5555555555555555555555555555555555555555",
        "l2CustomGateway": "0x6666666666666666666666666666666666666666",
        "l2BeaconProxyFactory": "0x7777777777777777777777777777777777777777",
        "cloneableProxyHash": "0x0000000000000000000000000000000000000000000000000000000000000001"
    }
}"#;
        let network: L2Network = serde_json::from_str(raw).unwrap();
        assert_eq!(network.chain_id, 412346);
        assert_eq!(network.eth_bridge.inbox, address!("9f8c1c641336A371031499e3c362e40d58d0f254"));
        assert_eq!(network.retryable_lifetime_seconds, crate::DEFAULT_RETRYABLE_LIFETIME_SECONDS);
        assert_eq!(network.outbox_expiry_blocks, None);
        assert!(network.is_custom_gateway(address!("6666666666666666666666666666666666666666")));
        assert!(!network.is_standard_gateway(address!("6666666666666666666666666666666666666666")));
    }

    #[test]
    fn test_standard_token_address_is_deterministic_per_token() {
        let network = L2Network {
            name: "local".into(),
            chain_id: 1,
            parent_chain_id: 2,
            eth_bridge: Default::default(),
            token_bridge: TokenBridge {
                l2_erc20_gateway: address!("4444444444444444444444444444444444444444"),
                l2_beacon_proxy_factory: address!("7777777777777777777777777777777777777777"),
                cloneable_proxy_hash: B256::repeat_byte(1),
                ..Default::default()
            },
            retryable_lifetime_seconds: crate::DEFAULT_RETRYABLE_LIFETIME_SECONDS,
            outbox_expiry_blocks: None,
        };
        let a = address!("000000000000000000000000000000000000000a");
        let b = address!("000000000000000000000000000000000000000b");
        assert_eq!(network.standard_l2_token_address(a), network.standard_l2_token_address(a));
        assert_ne!(network.standard_l2_token_address(a), network.standard_l2_token_address(b));
        assert_ne!(network.standard_l2_token_address(a), Address::ZERO);
    }
}
