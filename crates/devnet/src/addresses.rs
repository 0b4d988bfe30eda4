//! Fixed deployment addresses of the devnet contracts.

use alloy_primitives::{address, b256, Address, B256};
use nitro_bridge_primitives::{
    EthBridge, L2Network, TokenBridge, DEFAULT_RETRYABLE_LIFETIME_SECONDS,
};

/// The chain id of the devnet parent chain.
pub const L1_CHAIN_ID: u64 = 1337;

/// The chain id of the devnet child chain.
pub const L2_CHAIN_ID: u64 = 412346;

/// The account every [crate::Devnet::l1] and [crate::Devnet::l2] provider signs as.
pub const USER: Address = address!("3f1eae7d46d88f08fc2f8ed27fcb2ab183eb2d0e");

/// The account that posts assertion confirmations.
pub const VALIDATOR: Address = address!("6a568afe0f82d34759347bb36f14a6bb171d2cbe");

pub(crate) const BRIDGE: Address = address!("5ecf728ffc5c5e802091875f96281b5aeecf6c49");
pub(crate) const INBOX: Address = address!("9f8c1c641336a371031499e3c362e40d58d0f254");
pub(crate) const OUTBOX: Address = address!("50143333b44ea46255beb67255c9afd35551072f");
pub(crate) const ROLLUP: Address = address!("46966d871d29e1772c2809459469f849d8aab1a3");

pub(crate) const L1_ROUTER: Address = address!("0c4ba2cc47a6d6c6e8c4c7d65fcd9be2bfd46ddb");
pub(crate) const L2_ROUTER: Address = address!("9b014455acc2fe90c52803849d0002aeec184a06");
pub(crate) const L1_ERC20_GATEWAY: Address = address!("a2bdf7bfd0f7e40dd6bbc4fd7ea4a1b6a64d22f1");
pub(crate) const L2_ERC20_GATEWAY: Address = address!("ffa5c9fdbe9e2e1cd9c1a6d04a1dc8fbe4bd1e03");
pub(crate) const L1_CUSTOM_GATEWAY: Address = address!("1c924636933ceffbf9fb5e1be87d4c8a1a5f2f0a");
pub(crate) const L2_CUSTOM_GATEWAY: Address = address!("7c4e4f6c3c9e8b3d1f7ecd51f6a6d0b7f4c2a8b9");
pub(crate) const L2_BEACON_PROXY_FACTORY: Address =
    address!("3fe38087a94903a9d946fa1915e1772fe611000f");
pub(crate) const CLONEABLE_PROXY_HASH: B256 =
    b256!("4b11cb57b978697e0aec0c18581326376d6463fd1f6c6ac8a3ab3a8f4c1c3a9c");

/// Deploys parent chain tokens.
pub(crate) const L1_DEPLOYER: Address = address!("d0d0000000000000000000000000000000000001");

/// Deploys child chain custom tokens.
pub(crate) const L2_DEPLOYER: Address = address!("d0d0000000000000000000000000000000000002");

/// The network description of the devnet with the given retryable lifetime and outbox expiry.
pub(crate) fn network(
    retryable_lifetime_seconds: u64,
    outbox_expiry_blocks: Option<u64>,
) -> L2Network {
    L2Network {
        name: "devnet".to_string(),
        chain_id: L2_CHAIN_ID,
        parent_chain_id: L1_CHAIN_ID,
        eth_bridge: EthBridge { bridge: BRIDGE, inbox: INBOX, outbox: OUTBOX, rollup: ROLLUP },
        token_bridge: TokenBridge {
            l1_gateway_router: L1_ROUTER,
            l2_gateway_router: L2_ROUTER,
            l1_erc20_gateway: L1_ERC20_GATEWAY,
            l2_erc20_gateway: L2_ERC20_GATEWAY,
            l1_custom_gateway: L1_CUSTOM_GATEWAY,
            l2_custom_gateway: L2_CUSTOM_GATEWAY,
            l2_beacon_proxy_factory: L2_BEACON_PROXY_FACTORY,
            cloneable_proxy_hash: CLONEABLE_PROXY_HASH,
        },
        retryable_lifetime_seconds,
        outbox_expiry_blocks,
    }
}

/// The default lifetime of devnet tickets.
pub(crate) const RETRYABLE_LIFETIME_SECONDS: u64 = DEFAULT_RETRYABLE_LIFETIME_SECONDS;
