//! The [GatewaySetCoordinator] registers custom tokens with the custom gateway and the router.

use crate::{GatewayError, GatewayResult, RetryableGasParams, TokenGatewayResolver};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use core::fmt::{self, Display};
use nitro_bridge_messaging::{BridgeError, BridgeProviders, FailedMessage, RetryableTicketManager};
use nitro_bridge_primitives::{
    abi::ICustomToken, CrossDomainMessage, L1ToL2MessageStatus, RetryableTicket,
    TransactionReceipt, TransactionRequest,
};
use nitro_bridge_providers::{ChainProvider, ChainSigner, PendingTransaction, PollConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The progress of a custom token registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationState {
    /// Nothing submitted yet.
    NotStarted,
    /// Both tickets are scheduled; the token mapping ticket is being awaited.
    TokenMessageSent,
    /// The token mapping ticket was redeemed.
    TokenMessageRedeemed,
    /// The router ticket is being awaited.
    GatewayMessageSent,
    /// Both tickets were redeemed and the gateways resolve as registered.
    Complete,
    /// At least one ticket did not redeem, or verification failed.
    Failed,
}

impl Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::TokenMessageSent => "TOKEN_MESSAGE_SENT",
            Self::TokenMessageRedeemed => "TOKEN_MESSAGE_REDEEMED",
            Self::GatewayMessageSent => "GATEWAY_MESSAGE_SENT",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Gas budgets of the two registration tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationParams {
    /// The ticket registering the token with the child chain custom gateway.
    pub gateway: RetryableGasParams,
    /// The ticket registering the custom gateway with the child chain router.
    pub router: RetryableGasParams,
}

/// Registers custom tokens and verifies registrations through a [TokenGatewayResolver].
#[derive(Debug, Clone)]
pub struct GatewaySetCoordinator<L1, L2> {
    retryables: RetryableTicketManager<L1, L2>,
    resolver: TokenGatewayResolver<L1, L2>,
}

impl<L1: Clone, L2: Clone> GatewaySetCoordinator<L1, L2> {
    /// Creates a coordinator over the given chains.
    pub fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self {
            retryables: RetryableTicketManager::new(providers.clone()),
            resolver: TokenGatewayResolver::new(providers),
        }
    }
}

impl<L1, L2> GatewaySetCoordinator<L1, L2> {
    /// The manager tracking the registration tickets.
    pub const fn retryables(&self) -> &RetryableTicketManager<L1, L2> {
        &self.retryables
    }

    /// The resolver registrations are verified with.
    pub const fn resolver(&self) -> &TokenGatewayResolver<L1, L2> {
        &self.resolver
    }
}

impl<L1, L2> GatewaySetCoordinator<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    /// Submits the parent chain transaction that schedules both registration tickets, waits for
    /// its receipt and decodes the tickets.
    ///
    /// The registration is all-or-nothing only with respect to scheduling. Redeeming the tickets
    /// is left to [TwoMessageRegistration::complete].
    pub async fn register_custom_token<S: ChainSigner>(
        &self,
        l1_token: Address,
        l2_token: Address,
        l1_signer: &S,
        params: &RegistrationParams,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<TwoMessageRegistration> {
        let gas_price_bid = params.gateway.max_fee_per_gas.max(params.router.max_fee_per_gas);
        let gateway = RetryableGasParams { max_fee_per_gas: gas_price_bid, ..params.gateway };
        let router = RetryableGasParams { max_fee_per_gas: gas_price_bid, ..params.router };
        let call = ICustomToken::registerTokenOnL2Call {
            l2CustomTokenAddress: l2_token,
            maxSubmissionCostForCustomGateway: gateway.max_submission_cost,
            maxSubmissionCostForRouter: router.max_submission_cost,
            maxGasForCustomGateway: gateway.gas_limit,
            maxGasForRouter: router.gas_limit,
            gasPriceBid: gas_price_bid,
            valueForGateway: gateway.deposit_value(),
            valueForRouter: router.deposit_value(),
            creditBackAddress: l1_signer.address(),
        };
        let request = TransactionRequest::call(l1_token, call.abi_encode())
            .with_value(gateway.deposit_value().saturating_add(router.deposit_value()));

        let pending = PendingTransaction::send(l1_signer, request).await?;
        let receipt = pending.wait(l1_signer, config, cancel).await?;
        if !receipt.status {
            return Err(GatewayError::Reverted(receipt.transaction_hash));
        }

        let tickets = self.retryables.from_receipt(&receipt)?;
        let [token_ticket, gateway_ticket]: [RetryableTicket; 2] =
            tickets.try_into().map_err(|tickets: Vec<RetryableTicket>| {
                GatewayError::UnexpectedTickets {
                    tx_hash: receipt.transaction_hash,
                    expected: 2,
                    found: tickets.len(),
                }
            })?;
        info!(
            target: "gateway",
            %l1_token,
            %l2_token,
            token_ticket = %token_ticket.id(),
            gateway_ticket = %gateway_ticket.id(),
            "Scheduled custom gateway registration"
        );

        Ok(TwoMessageRegistration {
            l1_token,
            l2_token,
            receipt,
            token_ticket,
            gateway_ticket,
            state: RegistrationState::TokenMessageSent,
            failure: None,
        })
    }

    /// Checks that both routers resolve `l1_token` to the custom gateways and that both custom
    /// gateways map it to `l2_token`.
    pub async fn verify_registration(
        &self,
        l1_token: Address,
        l2_token: Address,
    ) -> GatewayResult<()> {
        let bridge = &self.resolver.providers().network.token_bridge;
        let mismatch = |reason: String| GatewayError::VerificationFailed { l1_token, reason };

        let l1_gateway = self.resolver.get_l1_gateway_address(l1_token).await?;
        if l1_gateway != bridge.l1_custom_gateway {
            return Err(mismatch(format!("parent chain router resolves to {l1_gateway}")));
        }
        let l2_gateway = self.resolver.get_l2_gateway_address(l1_token).await?;
        if l2_gateway != bridge.l2_custom_gateway {
            return Err(mismatch(format!("child chain router resolves to {l2_gateway}")));
        }
        let on_l1 = self.resolver.l1_to_l2_token_on_l1(l1_gateway, l1_token).await?;
        if on_l1 != l2_token {
            return Err(mismatch(format!("parent chain custom gateway maps to {on_l1}")));
        }
        let on_l2 = self.resolver.l1_to_l2_token_on_l2(l2_gateway, l1_token).await?;
        if on_l2 != l2_token {
            return Err(mismatch(format!("child chain custom gateway maps to {on_l2}")));
        }
        Ok(())
    }

    /// Waits for the auto-redeem of `ticket`. A ticket left holding its funds counts as failed.
    async fn await_ticket(
        &self,
        ticket: &RetryableTicket,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<Option<FailedMessage>> {
        let result = self.retryables.wait_for_auto_redeem(ticket, config, cancel).await?;
        if result.status == L1ToL2MessageStatus::Redeemed {
            return Ok(None);
        }
        let reason = match result.status {
            L1ToL2MessageStatus::FundsDepositedOnL2 => {
                format!("{} (auto-redeem failed, awaiting manual redeem)", result.status)
            }
            status => status.to_string(),
        };
        Ok(Some(FailedMessage { id: ticket.id(), reason }))
    }
}

/// The two tickets scheduled by one custom gateway registration, in scheduling order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoMessageRegistration {
    l1_token: Address,
    l2_token: Address,
    receipt: TransactionReceipt,
    token_ticket: RetryableTicket,
    gateway_ticket: RetryableTicket,
    state: RegistrationState,
    failure: Option<GatewayError>,
}

impl TwoMessageRegistration {
    /// The parent chain token being registered.
    pub const fn l1_token(&self) -> Address {
        self.l1_token
    }

    /// The child chain token being registered.
    pub const fn l2_token(&self) -> Address {
        self.l2_token
    }

    /// The receipt of the registration transaction.
    pub const fn receipt(&self) -> &TransactionReceipt {
        &self.receipt
    }

    /// The ticket registering the token with the child chain custom gateway.
    pub const fn token_ticket(&self) -> &RetryableTicket {
        &self.token_ticket
    }

    /// The ticket registering the custom gateway with the child chain router.
    pub const fn gateway_ticket(&self) -> &RetryableTicket {
        &self.gateway_ticket
    }

    /// The current state.
    pub const fn state(&self) -> RegistrationState {
        self.state
    }

    /// The error the registration failed with, once [RegistrationState::Failed].
    pub const fn failure(&self) -> Option<&GatewayError> {
        self.failure.as_ref()
    }

    fn advance(&mut self, state: RegistrationState) {
        info!(
            target: "gateway",
            l1_token = %self.l1_token,
            from = %self.state,
            to = %state,
            "Registration state changed"
        );
        self.state = state;
    }

    fn fail(&mut self, err: GatewayError) -> GatewayResult<RegistrationState> {
        self.advance(RegistrationState::Failed);
        self.failure = Some(err.clone());
        Err(err)
    }

    /// Awaits both tickets, then verifies the registration through the resolver.
    ///
    /// - both redeemed and verified: [RegistrationState::Complete]
    /// - exactly one redeemed: [BridgeError::PartialFailure] naming the other ticket
    /// - neither redeemed: [GatewayError::RegistrationFailed] naming both
    ///
    /// Failed tickets are not retried: once failed, every further call returns the same error.
    /// Cancellation and provider errors are returned as is and the call can be repeated.
    pub async fn complete<L1, L2>(
        &mut self,
        coordinator: &GatewaySetCoordinator<L1, L2>,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<RegistrationState>
    where
        L1: ChainProvider,
        L2: ChainProvider,
    {
        match (self.state, &self.failure) {
            (RegistrationState::Complete, _) => return Ok(self.state),
            (RegistrationState::Failed, Some(failure)) => return Err(failure.clone()),
            _ => {}
        }

        let token_failure = coordinator.await_ticket(&self.token_ticket, config, cancel).await?;
        if token_failure.is_none() && self.state == RegistrationState::TokenMessageSent {
            self.advance(RegistrationState::TokenMessageRedeemed);
        }
        if self.state != RegistrationState::GatewayMessageSent {
            self.advance(RegistrationState::GatewayMessageSent);
        }
        let gateway_failure =
            coordinator.await_ticket(&self.gateway_ticket, config, cancel).await?;

        match (token_failure, gateway_failure) {
            (None, None) => {
                let verified = coordinator.verify_registration(self.l1_token, self.l2_token).await;
                if let Err(err) = verified {
                    if matches!(err, GatewayError::VerificationFailed { .. }) {
                        return self.fail(err);
                    }
                    return Err(err);
                }
                self.advance(RegistrationState::Complete);
                Ok(self.state)
            }
            (Some(failed), None) | (None, Some(failed)) => {
                let succeeded = if failed.id == self.token_ticket.id() {
                    self.gateway_ticket.id()
                } else {
                    self.token_ticket.id()
                };
                warn!(
                    target: "gateway",
                    l1_token = %self.l1_token,
                    failed = %failed.id,
                    reason = %failed.reason,
                    "Registration partially failed"
                );
                self.fail(
                    BridgeError::PartialFailure { succeeded: vec![succeeded], failed: vec![failed] }
                        .into(),
                )
            }
            (Some(token), Some(gateway)) => {
                warn!(target: "gateway", l1_token = %self.l1_token, "Registration failed");
                let l1_token = self.l1_token;
                let failed = vec![token, gateway];
                self.fail(GatewayError::RegistrationFailed { l1_token, failed })
            }
        }
    }
}
