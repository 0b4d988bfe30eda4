//! The child chain contracts: precompiles, gateway router, gateways and bridged tokens.

use crate::{
    addresses::{
        L1_CUSTOM_GATEWAY, L1_ERC20_GATEWAY, L1_ROUTER, L2_CUSTOM_GATEWAY, L2_ERC20_GATEWAY,
        L2_ROUTER,
    },
    emit,
    l1::{balance_view, gateway_view_token, router_view},
    selector,
    token::Erc20,
    ExecutionError, ExecutionResult,
};
use alloy_primitives::{keccak256, Address, Bytes, Log, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use nitro_bridge_primitives::{
    abi::{
        IArbRetryableTx, IArbSys, IGatewayRouter, IL2CustomGateway, IL2GatewayRouter,
        INodeInterface, ITokenGateway,
    },
    apply_l1_to_l2_alias, outbox_item_hash, ArbHeaderInfo, L2Network, SendMerkleTree,
    ARB_RETRYABLE_TX_ADDRESS, ARB_SYS_ADDRESS, NODE_INTERFACE_ADDRESS,
};
use std::collections::HashMap;

/// The block a child chain transaction executes in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct L2Env<'a> {
    pub(crate) number: u64,
    pub(crate) timestamp: u64,
    pub(crate) l1_block: u64,
    pub(crate) gas: U256,
    pub(crate) network: &'a L2Network,
}

/// A redeem attempt scheduled by a transaction, executed in the following block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduledRetry {
    pub(crate) ticket_id: B256,
    pub(crate) hash: B256,
    pub(crate) gas: U256,
}

/// The effects of a successful child chain transaction.
#[derive(Debug, Default)]
pub(crate) struct L2Outcome {
    pub(crate) logs: Vec<Log>,
    pub(crate) retry: Option<ScheduledRetry>,
}

/// A retryable ticket held by `ArbRetryableTx`.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub(crate) from: Address,
    pub(crate) to: Address,
    pub(crate) value: U256,
    pub(crate) data: Bytes,
    pub(crate) beneficiary: Address,
    pub(crate) timeout: u64,
    pub(crate) tries: u64,
}

/// The hash of the `n`th redeem attempt of a ticket.
pub(crate) fn retry_tx_hash(ticket_id: B256, attempt: u64) -> B256 {
    keccak256([ticket_id.as_slice(), attempt.to_be_bytes().as_slice()].concat())
}

/// Child chain contract storage. Cloned before every transaction and restored on revert.
#[derive(Debug, Clone, Default)]
pub(crate) struct L2State {
    pub(crate) tickets: HashMap<B256, Ticket>,
    router: HashMap<Address, Address>,
    custom_gateway: HashMap<Address, Address>,
    standard_tokens: HashMap<Address, Address>,
    pub(crate) tokens: HashMap<Address, Erc20>,
    sends: SendMerkleTree,
    exit_num: u64,
}

impl L2State {
    /// The accumulator fields of a block mined on top of the current state.
    pub(crate) fn header_info(&self, l1_block_number: u64) -> ArbHeaderInfo {
        let send_count = self.sends.len();
        ArbHeaderInfo { send_root: self.sends.root(send_count), send_count, l1_block_number }
    }

    fn live_ticket(&mut self, ticket_id: B256, now: u64) -> ExecutionResult<&mut Ticket> {
        match self.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.timeout > now => Ok(ticket),
            _ => Err(ExecutionError::custom(IArbRetryableTx::NoTicketWithID {})),
        }
    }

    /// Executes a transaction from `from` calling `to` with `input` and `value` attached.
    pub(crate) fn execute(
        &mut self,
        env: &L2Env<'_>,
        from: Address,
        to: Address,
        input: &[u8],
        value: U256,
    ) -> ExecutionResult<L2Outcome> {
        let sel = selector(input);
        let mut outcome = L2Outcome::default();
        if to == ARB_SYS_ADDRESS && sel == IArbSys::sendTxToL1Call::SELECTOR {
            let call = IArbSys::sendTxToL1Call::abi_decode(input, true)?;
            let log = self.send_to_l1(env, from, call.destination, value, call.data);
            outcome.logs.push(log);
        } else if to == ARB_RETRYABLE_TX_ADDRESS {
            self.retryable_precompile(env, &mut outcome, from, input)?;
        } else if to == L2_ROUTER && sel == IL2GatewayRouter::setGatewayCall::SELECTOR {
            if from != apply_l1_to_l2_alias(L1_ROUTER) {
                return Err(ExecutionError::revert("ONLY_COUNTERPART_GATEWAY"));
            }
            let call = IL2GatewayRouter::setGatewayCall::abi_decode(input, true)?;
            for (token, gateway) in call.l1Token.into_iter().zip(call.gateway) {
                self.router.insert(token, gateway);
                outcome.logs.push(emit(
                    L2_ROUTER,
                    &IGatewayRouter::GatewaySet { l1Token: token, gateway },
                ));
            }
        } else if to == L2_ROUTER && sel == IL2GatewayRouter::outboundTransferCall::SELECTOR {
            let call = IL2GatewayRouter::outboundTransferCall::abi_decode(input, true)?;
            self.withdraw(env, &mut outcome, from, call)?;
        } else if to == L2_CUSTOM_GATEWAY
            && sel == IL2CustomGateway::registerTokenFromL1Call::SELECTOR
        {
            if from != apply_l1_to_l2_alias(L1_CUSTOM_GATEWAY) {
                return Err(ExecutionError::revert("ONLY_COUNTERPART_GATEWAY"));
            }
            let call = IL2CustomGateway::registerTokenFromL1Call::abi_decode(input, true)?;
            for (l1_token, l2_token) in call.l1Address.into_iter().zip(call.l2Address) {
                self.custom_gateway.insert(l1_token, l2_token);
                outcome.logs.push(emit(
                    L2_CUSTOM_GATEWAY,
                    &ITokenGateway::TokenSet { l1Address: l1_token, l2Address: l2_token },
                ));
            }
        } else if (to == L2_ERC20_GATEWAY || to == L2_CUSTOM_GATEWAY)
            && sel == ITokenGateway::finalizeInboundTransferCall::SELECTOR
        {
            let call = ITokenGateway::finalizeInboundTransferCall::abi_decode(input, true)?;
            self.finalize_deposit(env, &mut outcome, from, to, call)?;
        }
        Ok(outcome)
    }

    fn retryable_precompile(
        &mut self,
        env: &L2Env<'_>,
        outcome: &mut L2Outcome,
        from: Address,
        input: &[u8],
    ) -> ExecutionResult<()> {
        let sel = selector(input);
        if sel == IArbRetryableTx::redeemCall::SELECTOR {
            let ticket_id = IArbRetryableTx::redeemCall::abi_decode(input, true)?.ticketId;
            let ticket = self.live_ticket(ticket_id, env.timestamp)?;
            let sequence = ticket.tries;
            ticket.tries += 1;
            let hash = retry_tx_hash(ticket_id, sequence);
            outcome.logs.push(redeem_scheduled(ticket_id, hash, sequence, env.gas, from));
            outcome.retry = Some(ScheduledRetry { ticket_id, hash, gas: env.gas });
        } else if sel == IArbRetryableTx::cancelCall::SELECTOR {
            let ticket_id = IArbRetryableTx::cancelCall::abi_decode(input, true)?.ticketId;
            let ticket = self.live_ticket(ticket_id, env.timestamp)?;
            if ticket.beneficiary != from {
                return Err(ExecutionError::revert("only the beneficiary may cancel a retryable"));
            }
            self.tickets.remove(&ticket_id);
            outcome.logs.push(emit(
                ARB_RETRYABLE_TX_ADDRESS,
                &IArbRetryableTx::Canceled { ticketId: ticket_id },
            ));
        } else if sel == IArbRetryableTx::keepaliveCall::SELECTOR {
            let ticket_id = IArbRetryableTx::keepaliveCall::abi_decode(input, true)?.ticketId;
            let lifetime = env.network.retryable_lifetime_seconds;
            let ticket = self.live_ticket(ticket_id, env.timestamp)?;
            if ticket.timeout > env.timestamp.saturating_add(lifetime) {
                return Err(ExecutionError::revert("timeout too far into the future"));
            }
            ticket.timeout += lifetime;
            outcome.logs.push(emit(
                ARB_RETRYABLE_TX_ADDRESS,
                &IArbRetryableTx::LifetimeExtended {
                    ticketId: ticket_id,
                    newTimeout: U256::from(ticket.timeout),
                },
            ));
        } else {
            return Err(ExecutionError::revert("unknown ArbRetryableTx method"));
        }
        Ok(())
    }

    /// Records a child-to-parent message and returns its `L2ToL1Tx` log.
    fn send_to_l1(
        &mut self,
        env: &L2Env<'_>,
        caller: Address,
        destination: Address,
        value: U256,
        data: Bytes,
    ) -> Log {
        let (arb_block, eth_block, timestamp) =
            (U256::from(env.number), U256::from(env.l1_block), U256::from(env.timestamp));
        let item =
            outbox_item_hash(caller, destination, arb_block, eth_block, timestamp, value, &data);
        let position = self.sends.push(item);
        emit(
            ARB_SYS_ADDRESS,
            &IArbSys::L2ToL1Tx {
                caller,
                destination,
                hash: U256::from_be_bytes(item.0),
                position: U256::from(position),
                arbBlockNum: arb_block,
                ethBlockNum: eth_block,
                timestamp,
                callvalue: value,
                data,
            },
        )
    }

    fn withdraw(
        &mut self,
        env: &L2Env<'_>,
        outcome: &mut L2Outcome,
        from: Address,
        call: IL2GatewayRouter::outboundTransferCall,
    ) -> ExecutionResult<()> {
        let gateway = self.router.get(&call.l1Token).copied().unwrap_or(L2_ERC20_GATEWAY);
        let (l2_token, counterpart) = if gateway == L2_CUSTOM_GATEWAY {
            (self.custom_gateway.get(&call.l1Token).copied(), L1_CUSTOM_GATEWAY)
        } else {
            (self.standard_tokens.get(&call.l1Token).copied(), L1_ERC20_GATEWAY)
        };
        let book = l2_token
            .and_then(|token| self.tokens.get_mut(&token))
            .ok_or_else(|| ExecutionError::revert("NO_L2_TOKEN"))?;
        book.burn(from, call.amount)?;

        let exit_num = U256::from(self.exit_num);
        self.exit_num += 1;
        let finalize = ITokenGateway::finalizeInboundTransferCall {
            token: call.l1Token,
            from,
            to: call.to,
            amount: call.amount,
            data: (exit_num, Bytes::new()).abi_encode_params().into(),
        };
        let position = self.sends.len();
        let log =
            self.send_to_l1(env, gateway, counterpart, U256::ZERO, finalize.abi_encode().into());
        outcome.logs.push(log);
        outcome.logs.push(emit(
            gateway,
            &ITokenGateway::WithdrawalInitiated {
                l1Token: call.l1Token,
                _from: from,
                _to: call.to,
                _l2ToL1Id: U256::from(position),
                _exitNum: exit_num,
                _amount: call.amount,
            },
        ));
        Ok(())
    }

    fn finalize_deposit(
        &mut self,
        env: &L2Env<'_>,
        outcome: &mut L2Outcome,
        from: Address,
        gateway: Address,
        call: ITokenGateway::finalizeInboundTransferCall,
    ) -> ExecutionResult<()> {
        let counterpart =
            if gateway == L2_ERC20_GATEWAY { L1_ERC20_GATEWAY } else { L1_CUSTOM_GATEWAY };
        if from != apply_l1_to_l2_alias(counterpart) {
            return Err(ExecutionError::revert("ONLY_COUNTERPART_GATEWAY"));
        }
        let l2_token = if gateway == L2_ERC20_GATEWAY {
            let token = env.network.standard_l2_token_address(call.token);
            self.standard_tokens.insert(call.token, token);
            token
        } else {
            self.custom_gateway
                .get(&call.token)
                .copied()
                .ok_or_else(|| ExecutionError::revert("NO_L2_TOKEN_SET"))?
        };
        self.tokens.entry(l2_token).or_default().mint(call.to, call.amount);
        outcome.logs.push(emit(
            gateway,
            &ITokenGateway::DepositFinalized {
                l1Token: call.token,
                _from: call.from,
                _to: call.to,
                _amount: call.amount,
            },
        ));
        Ok(())
    }

    /// Answers a read-only call at child chain time `now`.
    pub(crate) fn call(
        &self,
        network: &L2Network,
        now: u64,
        to: Address,
        input: &[u8],
    ) -> ExecutionResult<Bytes> {
        let sel = selector(input);
        let output = if to == ARB_RETRYABLE_TX_ADDRESS
            && sel == IArbRetryableTx::getTimeoutCall::SELECTOR
        {
            let ticket_id = IArbRetryableTx::getTimeoutCall::abi_decode(input, true)?.ticketId;
            match self.tickets.get(&ticket_id) {
                Some(ticket) if ticket.timeout > now => {
                    let timeout = U256::from(ticket.timeout);
                    IArbRetryableTx::getTimeoutCall::abi_encode_returns(&(timeout,))
                }
                _ => return Err(ExecutionError::custom(IArbRetryableTx::NoTicketWithID {})),
            }
        } else if to == ARB_RETRYABLE_TX_ADDRESS
            && sel == IArbRetryableTx::getLifetimeCall::SELECTOR
        {
            let lifetime = U256::from(network.retryable_lifetime_seconds);
            IArbRetryableTx::getLifetimeCall::abi_encode_returns(&(lifetime,))
        } else if to == NODE_INTERFACE_ADDRESS
            && sel == INodeInterface::constructOutboxProofCall::SELECTOR
        {
            let call = INodeInterface::constructOutboxProofCall::abi_decode(input, true)?;
            let proof = self
                .sends
                .proof(call.size, call.leaf)
                .ok_or_else(|| ExecutionError::revert("leaf out of range"))?;
            INodeInterface::constructOutboxProofCall::abi_encode_returns(&(
                proof.send,
                proof.root,
                proof.proof,
            ))
        } else if to == L2_ROUTER {
            router_view(input, &self.router, L2_ERC20_GATEWAY)?
        } else if to == L2_ERC20_GATEWAY || to == L2_CUSTOM_GATEWAY {
            let token = gateway_view_token(input)?;
            let l2_token = if to == L2_CUSTOM_GATEWAY {
                self.custom_gateway.get(&token).copied().unwrap_or_default()
            } else if sel == ITokenGateway::calculateL2TokenAddressCall::SELECTOR {
                network.standard_l2_token_address(token)
            } else {
                self.standard_tokens.get(&token).copied().unwrap_or_default()
            };
            (l2_token,).abi_encode_params()
        } else if let Some(book) = self.tokens.get(&to) {
            balance_view(input, book)?
        } else {
            return Err(ExecutionError::revert("call to non-contract"));
        };
        Ok(output.into())
    }
}

fn redeem_scheduled(ticket_id: B256, hash: B256, sequence: u64, gas: U256, donor: Address) -> Log {
    emit(
        ARB_RETRYABLE_TX_ADDRESS,
        &IArbRetryableTx::RedeemScheduled {
            ticketId: ticket_id,
            retryTxHash: hash,
            sequenceNum: sequence,
            donatedGas: gas.saturating_to(),
            gasDonor: donor,
            maxRefund: U256::ZERO,
            submissionFeeRefund: U256::ZERO,
        },
    )
}

/// The `TicketCreated` and, when `gas` is non-zero, auto-redeem `RedeemScheduled` logs of a ticket
/// creation.
pub(crate) fn creation_logs(
    ticket_id: B256,
    gas: U256,
    donor: Address,
) -> (Vec<Log>, Option<ScheduledRetry>) {
    let created = IArbRetryableTx::TicketCreated { ticketId: ticket_id };
    let mut logs = vec![emit(ARB_RETRYABLE_TX_ADDRESS, &created)];
    if gas.is_zero() {
        return (logs, None);
    }
    let hash = retry_tx_hash(ticket_id, 0);
    logs.push(redeem_scheduled(ticket_id, hash, 0, gas, donor));
    (logs, Some(ScheduledRetry { ticket_id, hash, gas }))
}
