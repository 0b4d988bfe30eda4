//! The [Erc20Bridger] moves ERC-20 tokens through the gateway routers.

use crate::{GatewayError, GatewayResult, RetryableGasParams, TokenGatewayResolver};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use nitro_bridge_messaging::{
    BridgeProviders, OutboxMessageManager, RetryableTicketManager, WithdrawalEvent,
};
use nitro_bridge_primitives::{
    abi::{IGatewayRouter, IERC20, IL1GatewayRouter, IL2GatewayRouter},
    RetryableTicket, TokenBridge, TransactionReceipt, TransactionRequest,
};
use nitro_bridge_providers::{BlockTag, ChainProvider, ChainSigner, PendingTransaction};
use tracing::info;

/// Approves, deposits and withdraws tokens, and hands out the message managers that track them.
#[derive(Debug, Clone)]
pub struct Erc20Bridger<L1, L2> {
    retryables: RetryableTicketManager<L1, L2>,
    outbox: OutboxMessageManager<L1, L2>,
    resolver: TokenGatewayResolver<L1, L2>,
}

impl<L1: Clone, L2: Clone> Erc20Bridger<L1, L2> {
    /// Creates a bridger over the given chains.
    pub fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self {
            retryables: RetryableTicketManager::new(providers.clone()),
            outbox: OutboxMessageManager::new(providers.clone()),
            resolver: TokenGatewayResolver::new(providers),
        }
    }
}

impl<L1, L2> Erc20Bridger<L1, L2> {
    /// The manager tracking deposit tickets.
    pub const fn retryables(&self) -> &RetryableTicketManager<L1, L2> {
        &self.retryables
    }

    /// The manager tracking withdrawal messages.
    pub const fn outbox(&self) -> &OutboxMessageManager<L1, L2> {
        &self.outbox
    }

    /// The resolver used to find gateways and counterparts.
    pub const fn resolver(&self) -> &TokenGatewayResolver<L1, L2> {
        &self.resolver
    }

    /// Decodes the ticket of a deposit transaction.
    pub fn deposit_ticket(&self, receipt: &TransactionReceipt) -> GatewayResult<RetryableTicket> {
        let mut tickets = self.retryables.from_receipt(receipt)?;
        if tickets.len() != 1 {
            return Err(GatewayError::UnexpectedTickets {
                tx_hash: receipt.transaction_hash,
                expected: 1,
                found: tickets.len(),
            });
        }
        Ok(tickets.remove(0))
    }
}

impl<L1, L2> Erc20Bridger<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    fn token_bridge(&self) -> &TokenBridge {
        &self.resolver.providers().network.token_bridge
    }

    /// Allows the parent chain gateway of `l1_token` to pull `amount` from the signer.
    pub async fn approve_token<S: ChainSigner>(
        &self,
        l1_token: Address,
        amount: U256,
        l1_signer: &S,
    ) -> GatewayResult<PendingTransaction> {
        let router = self.token_bridge().l1_gateway_router;
        let gateway = self
            .resolver
            .providers()
            .l1
            .call_sol(router, IGatewayRouter::getGatewayCall { token: l1_token })
            .await?
            .gateway;
        let input = IERC20::approveCall { spender: gateway, amount }.abi_encode();
        let pending =
            PendingTransaction::send(l1_signer, TransactionRequest::call(l1_token, input)).await?;
        info!(
            target: "bridger",
            %l1_token,
            %gateway,
            %amount,
            tx = %pending.hash(),
            "Submitted approval"
        );
        Ok(pending)
    }

    /// Deposits `amount` of `l1_token` to the signer's account on the child chain.
    ///
    /// The transaction carries `params.deposit_value()` to fund the deposit ticket.
    pub async fn deposit<S: ChainSigner>(
        &self,
        l1_token: Address,
        amount: U256,
        l1_signer: &S,
        params: &RetryableGasParams,
    ) -> GatewayResult<PendingTransaction> {
        let call = IL1GatewayRouter::outboundTransferCall {
            token: l1_token,
            to: l1_signer.address(),
            amount,
            maxGas: params.gas_limit,
            gasPriceBid: params.max_fee_per_gas,
            data: (params.max_submission_cost, Bytes::new()).abi_encode_params().into(),
        };
        let router = self.token_bridge().l1_gateway_router;
        let request =
            TransactionRequest::call(router, call.abi_encode()).with_value(params.deposit_value());
        let pending = PendingTransaction::send(l1_signer, request).await?;
        info!(target: "bridger", %l1_token, %amount, tx = %pending.hash(), "Submitted deposit");
        Ok(pending)
    }

    /// Withdraws `amount` of the child chain counterpart of `l1_token` to `destination` on the
    /// parent chain. Fails with [GatewayError::NotBridged] if no child chain gateway knows the
    /// token.
    pub async fn withdraw<S: ChainSigner>(
        &self,
        l1_token: Address,
        amount: U256,
        destination: Address,
        l2_signer: &S,
    ) -> GatewayResult<PendingTransaction> {
        if self.resolver.get_l2_gateway_address(l1_token).await?.is_zero() {
            return Err(GatewayError::NotBridged(l1_token));
        }
        let call = IL2GatewayRouter::outboundTransferCall {
            l1Token: l1_token,
            to: destination,
            amount,
            data: Bytes::new(),
        };
        let router = self.token_bridge().l2_gateway_router;
        let request = TransactionRequest::call(router, call.abi_encode());
        let pending = PendingTransaction::send(l2_signer, request).await?;
        info!(
            target: "bridger",
            %l1_token,
            %amount,
            %destination,
            tx = %pending.hash(),
            "Submitted withdrawal"
        );
        Ok(pending)
    }

    /// Returns the withdrawals of `l1_token` initiated between `from_block` and `to_block`,
    /// optionally only those sent by `from`.
    pub async fn get_l2_withdrawal_events(
        &self,
        l1_token: Address,
        from_block: u64,
        to_block: BlockTag,
        from: Option<Address>,
    ) -> GatewayResult<Vec<WithdrawalEvent>> {
        let gateway = self
            .resolver
            .providers()
            .l2
            .call_sol(
                self.token_bridge().l2_gateway_router,
                IGatewayRouter::getGatewayCall { token: l1_token },
            )
            .await?
            .gateway;
        Ok(self
            .outbox
            .query_withdrawal_events(gateway, from_block, to_block, Some(l1_token), from)
            .await?)
    }

    /// The child chain token contract bridged from `l1_token`.
    pub async fn l2_token_contract_address(&self, l1_token: Address) -> GatewayResult<Address> {
        self.resolver.get_l2_token_address(l1_token).await
    }

    /// The parent chain balance of `account` in `l1_token`.
    pub async fn l1_balance(&self, l1_token: Address, account: Address) -> GatewayResult<U256> {
        let call = IERC20::balanceOfCall { account };
        Ok(self.resolver.providers().l1.call_sol(l1_token, call).await?.balance)
    }

    /// The child chain balance of `account` in the counterpart of `l1_token`.
    pub async fn l2_balance(&self, l1_token: Address, account: Address) -> GatewayResult<U256> {
        let l2_token = self.l2_token_contract_address(l1_token).await?;
        let call = IERC20::balanceOfCall { account };
        Ok(self.resolver.providers().l2.call_sol(l2_token, call).await?.balance)
    }
}
