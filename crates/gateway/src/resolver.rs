//! The [TokenGatewayResolver] answers which gateway handles a token and what it bridges to.

use crate::GatewayResult;
use alloy_primitives::Address;
use nitro_bridge_messaging::BridgeProviders;
use nitro_bridge_primitives::abi::{IGatewayRouter, ITokenGateway};
use nitro_bridge_providers::ChainProvider;
use tracing::debug;

/// Reads gateway routing from the routers and gateways on both chains.
#[derive(Debug, Clone)]
pub struct TokenGatewayResolver<L1, L2> {
    providers: BridgeProviders<L1, L2>,
}

impl<L1, L2> TokenGatewayResolver<L1, L2> {
    /// Creates a resolver over the given chains.
    pub const fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self { providers }
    }

    /// The chains the resolver reads.
    pub const fn providers(&self) -> &BridgeProviders<L1, L2> {
        &self.providers
    }

    /// The child chain address of the standard token bridged from `l1_token`. No chain call.
    pub fn derive_standard_l2_token_address(&self, l1_token: Address) -> Address {
        self.providers.network.standard_l2_token_address(l1_token)
    }
}

impl<L1, L2> TokenGatewayResolver<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    /// The parent chain gateway handling `l1_token`, or the zero address if the token is neither
    /// registered with a gateway nor known to the default gateway.
    pub async fn get_l1_gateway_address(&self, l1_token: Address) -> GatewayResult<Address> {
        let router = self.providers.network.token_bridge.l1_gateway_router;
        let gateway = resolve_gateway(&self.providers.l1, router, l1_token).await?;
        debug!(target: "gateway", %l1_token, %gateway, "Resolved parent chain gateway");
        Ok(gateway)
    }

    /// The child chain gateway handling `l1_token`, by the same rule as
    /// [Self::get_l1_gateway_address].
    pub async fn get_l2_gateway_address(&self, l1_token: Address) -> GatewayResult<Address> {
        let router = self.providers.network.token_bridge.l2_gateway_router;
        let gateway = resolve_gateway(&self.providers.l2, router, l1_token).await?;
        debug!(target: "gateway", %l1_token, %gateway, "Resolved child chain gateway");
        Ok(gateway)
    }

    /// The counterpart of `l1_token` registered with the parent chain `gateway`.
    pub async fn l1_to_l2_token_on_l1(
        &self,
        gateway: Address,
        l1_token: Address,
    ) -> GatewayResult<Address> {
        l1_to_l2_token(&self.providers.l1, gateway, l1_token).await
    }

    /// The counterpart of `l1_token` registered with the child chain `gateway`.
    pub async fn l1_to_l2_token_on_l2(
        &self,
        gateway: Address,
        l1_token: Address,
    ) -> GatewayResult<Address> {
        l1_to_l2_token(&self.providers.l2, gateway, l1_token).await
    }

    /// The child chain counterpart of `l1_token`.
    ///
    /// Tokens routed to a custom gateway have independently deployed counterparts, read from the
    /// parent chain custom gateway. Every other token maps to its derived standard address.
    pub async fn get_l2_token_address(&self, l1_token: Address) -> GatewayResult<Address> {
        let router = self.providers.network.token_bridge.l1_gateway_router;
        let gateway = self
            .providers
            .l1
            .call_sol(router, IGatewayRouter::getGatewayCall { token: l1_token })
            .await?
            .gateway;
        if self.providers.network.is_custom_gateway(gateway) {
            return self.l1_to_l2_token_on_l1(gateway, l1_token).await;
        }
        Ok(self.derive_standard_l2_token_address(l1_token))
    }
}

/// Applies the routing rule against `router`: an explicit registration wins, then the default
/// gateway if it knows the token, otherwise the zero address.
async fn resolve_gateway<P: ChainProvider>(
    provider: &P,
    router: Address,
    l1_token: Address,
) -> GatewayResult<Address> {
    let registered = provider
        .call_sol(router, IGatewayRouter::l1TokenToGatewayCall { token: l1_token })
        .await?
        .gateway;
    if !registered.is_zero() {
        return Ok(registered);
    }

    let default = provider.call_sol(router, IGatewayRouter::defaultGatewayCall {}).await?.gateway;
    if default.is_zero() {
        return Ok(Address::ZERO);
    }
    if l1_to_l2_token(provider, default, l1_token).await?.is_zero() {
        return Ok(Address::ZERO);
    }
    Ok(default)
}

async fn l1_to_l2_token<P: ChainProvider>(
    provider: &P,
    gateway: Address,
    l1_token: Address,
) -> GatewayResult<Address> {
    let call = ITokenGateway::l1ToL2TokenCall { l1Token: l1_token };
    Ok(provider.call_sol(gateway, call).await?.l2Token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolCall;
    use nitro_bridge_devnet::{Devnet, DevnetProvider};
    use nitro_bridge_providers::{test_utils::MockChainProvider, ProviderError};

    const TOKEN: Address = address!("00000000000000000000000000000000000070c1");

    fn resolver(devnet: &Devnet) -> TokenGatewayResolver<DevnetProvider, DevnetProvider> {
        TokenGatewayResolver::new(BridgeProviders::new(devnet.l1(), devnet.l2(), devnet.network()))
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_zero() {
        let devnet = Devnet::new();
        let resolver = resolver(&devnet);
        assert_eq!(resolver.get_l1_gateway_address(TOKEN).await.unwrap(), Address::ZERO);
        assert_eq!(resolver.get_l2_gateway_address(TOKEN).await.unwrap(), Address::ZERO);
    }

    #[tokio::test]
    async fn test_standard_token_address_is_derived() {
        let devnet = Devnet::new();
        let resolver = resolver(&devnet);
        let derived = resolver.derive_standard_l2_token_address(TOKEN);
        assert_eq!(derived, devnet.network().standard_l2_token_address(TOKEN));
        assert_eq!(resolver.get_l2_token_address(TOKEN).await.unwrap(), derived);

        let gateway = devnet.network().token_bridge.l1_erc20_gateway;
        let computed = resolver
            .providers()
            .l1
            .call_sol(gateway, ITokenGateway::calculateL2TokenAddressCall { l1Token: TOKEN })
            .await
            .unwrap()
            .l2Token;
        assert_eq!(computed, derived);
    }

    #[tokio::test]
    async fn test_registered_gateway_wins_over_default() {
        let l1 = MockChainProvider::default();
        let router = address!("0000000000000000000000000000000000000a01");
        let custom = address!("0000000000000000000000000000000000000c01");
        l1.mock_call(
            router,
            IGatewayRouter::l1TokenToGatewayCall { token: TOKEN }.abi_encode(),
            Ok(IGatewayRouter::l1TokenToGatewayCall::abi_encode_returns(&(custom,)).into()),
        );
        assert_eq!(resolve_gateway(&l1, router, TOKEN).await.unwrap(), custom);

        l1.set_offline(true);
        let err = resolve_gateway(&l1, router, TOKEN).await.unwrap_err();
        assert!(matches!(err, crate::GatewayError::Provider(ProviderError::Transport(_))));
    }
}
