//! The parent chain contracts: inbox, rollup, outbox, gateway router, gateways and tokens.

use crate::{
    addresses::{
        BRIDGE, INBOX, L1_CUSTOM_GATEWAY, L1_ERC20_GATEWAY, L1_ROUTER, L2_CUSTOM_GATEWAY,
        L2_ERC20_GATEWAY, L2_ROUTER, OUTBOX, ROLLUP,
    },
    emit, selector,
    token::Erc20,
    ExecutionError, ExecutionResult,
};
use alloy_primitives::{keccak256, Address, Bytes, Log, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use nitro_bridge_primitives::{
    abi::{
        IBridge, ICustomToken, IERC20, IGatewayRouter, IInbox, IL1GatewayRouter,
        IL2CustomGateway, IL2GatewayRouter, IOutbox, IRollup, ITokenGateway,
    },
    apply_l1_to_l2_alias, outbox_item_hash, EthDepositData, L2Network, OutboxProof,
    SubmitRetryableData, L1_MESSAGE_TYPE_ETH_DEPOSIT, L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX,
};
use std::collections::{HashMap, HashSet};

/// The block a parent chain transaction executes in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct L1Env<'a> {
    pub(crate) timestamp: u64,
    pub(crate) network: &'a L2Network,
}

/// A message appended to the delayed inbox, as the child chain will consume it.
#[derive(Debug, Clone)]
pub(crate) struct DeliveredMessage {
    pub(crate) index: u64,
    pub(crate) kind: u8,
    pub(crate) sender: Address,
    pub(crate) payload: Bytes,
    pub(crate) base_fee: U256,
}

/// The effects of a successful parent chain transaction.
#[derive(Debug, Default)]
pub(crate) struct L1Outcome {
    pub(crate) logs: Vec<Log>,
    pub(crate) delivered: Vec<DeliveredMessage>,
}

/// A confirmed rollup assertion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Assertion {
    pub(crate) created_at_block: u64,
    pub(crate) send_root: B256,
    pub(crate) send_count: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct L1Token {
    pub(crate) book: Erc20,
    pub(crate) custom: bool,
}

/// Parent chain contract storage. Cloned before every transaction and restored on revert.
#[derive(Debug, Clone)]
pub(crate) struct L1State {
    pub(crate) base_fee: U256,
    delayed_count: u64,
    inbox_acc: B256,
    pub(crate) tokens: HashMap<Address, L1Token>,
    router: HashMap<Address, Address>,
    custom_gateway: HashMap<Address, Address>,
    standard_bridged: HashSet<Address>,
    deposit_nonce: u64,
    pub(crate) assertions: Vec<Assertion>,
    spent: HashSet<u64>,
}

impl Default for L1State {
    fn default() -> Self {
        Self {
            base_fee: U256::from(1_000_000_000u64),
            delayed_count: 0,
            inbox_acc: B256::ZERO,
            tokens: HashMap::new(),
            router: HashMap::new(),
            custom_gateway: HashMap::new(),
            standard_bridged: HashSet::new(),
            deposit_nonce: 0,
            assertions: Vec::new(),
            spent: HashSet::new(),
        }
    }
}

fn to_token_method(
    tokens: &HashMap<Address, L1Token>,
    to: Address,
    sel: [u8; 4],
    method: [u8; 4],
) -> bool {
    sel == method && tokens.contains_key(&to)
}

fn insufficient_value(required: U256, provided: U256) -> ExecutionError {
    ExecutionError::revert(format!("InsufficientValue({required}, {provided})"))
}

impl L1State {
    /// Executes a transaction from `from` calling `to` with `input` and `value` attached.
    pub(crate) fn execute(
        &mut self,
        env: &L1Env<'_>,
        from: Address,
        to: Address,
        input: &[u8],
        value: U256,
    ) -> ExecutionResult<L1Outcome> {
        let sel = selector(input);
        let mut outcome = L1Outcome::default();
        if to == INBOX && sel == IInbox::depositEthCall::SELECTOR {
            let payload = EthDepositData { dest: from, value }.encode();
            self.deliver(env, &mut outcome, L1_MESSAGE_TYPE_ETH_DEPOSIT, from, payload);
        } else if to == INBOX && sel == IInbox::createRetryableTicketCall::SELECTOR {
            let call = IInbox::createRetryableTicketCall::abi_decode(input, true)?;
            let required = call
                .maxSubmissionCost
                .saturating_add(call.l2CallValue)
                .saturating_add(call.gasLimit.saturating_mul(call.maxFeePerGas));
            if value < required {
                return Err(insufficient_value(required, value));
            }
            let payload = SubmitRetryableData {
                dest: call.to,
                l2_call_value: call.l2CallValue,
                deposit_value: value,
                max_submission_fee: call.maxSubmissionCost,
                excess_fee_refund_address: call.excessFeeRefundAddress,
                call_value_refund_address: call.callValueRefundAddress,
                gas_limit: call.gasLimit,
                max_fee_per_gas: call.maxFeePerGas,
                data: call.data,
            }
            .encode();
            self.deliver(env, &mut outcome, L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX, from, payload);
        } else if to == L1_ROUTER && sel == IL1GatewayRouter::outboundTransferCall::SELECTOR {
            let call = IL1GatewayRouter::outboundTransferCall::abi_decode(input, true)?;
            self.deposit(env, &mut outcome, from, call, value)?;
        } else if to == OUTBOX && sel == IOutbox::executeTransactionCall::SELECTOR {
            let call = IOutbox::executeTransactionCall::abi_decode(input, true)?;
            self.execute_outbox(&mut outcome, call)?;
        } else if to_token_method(&self.tokens, to, sel, IERC20::approveCall::SELECTOR) {
            let call = IERC20::approveCall::abi_decode(input, true)?;
            if let Some(token) = self.tokens.get_mut(&to) {
                token.book.approve(from, call.spender, call.amount);
            }
        } else if to_token_method(
            &self.tokens,
            to,
            sel,
            ICustomToken::registerTokenOnL2Call::SELECTOR,
        ) {
            if !self.tokens.get(&to).is_some_and(|token| token.custom) {
                return Err(ExecutionError::revert("NOT_ARB_ENABLED"));
            }
            let call = ICustomToken::registerTokenOnL2Call::abi_decode(input, true)?;
            self.register_custom_token(env, &mut outcome, to, call, value)?;
        }
        Ok(outcome)
    }

    /// Appends a message to the delayed inbox. Senders are aliased as the child chain sees them.
    fn deliver(
        &mut self,
        env: &L1Env<'_>,
        outcome: &mut L1Outcome,
        kind: u8,
        sender: Address,
        payload: Bytes,
    ) -> u64 {
        let index = self.delayed_count;
        self.delayed_count += 1;
        let sender = apply_l1_to_l2_alias(sender);
        let data_hash = keccak256(&payload);
        let before = self.inbox_acc;
        self.inbox_acc = keccak256([before.as_slice(), data_hash.as_slice()].concat());

        outcome.logs.push(emit(
            BRIDGE,
            &IBridge::MessageDelivered {
                messageIndex: U256::from(index),
                beforeInboxAcc: before,
                inbox: INBOX,
                kind,
                sender,
                messageDataHash: data_hash,
                baseFeeL1: self.base_fee,
                timestamp: env.timestamp,
            },
        ));
        outcome.logs.push(emit(
            INBOX,
            &IInbox::InboxMessageDelivered { messageNum: U256::from(index), data: payload.clone() },
        ));
        outcome.delivered.push(DeliveredMessage {
            index,
            kind,
            sender,
            payload,
            base_fee: self.base_fee,
        });
        index
    }

    #[allow(clippy::too_many_arguments)]
    fn create_retryable(
        &mut self,
        env: &L1Env<'_>,
        outcome: &mut L1Outcome,
        sender: Address,
        dest: Address,
        deposit_value: U256,
        max_submission_fee: U256,
        refund: Address,
        gas_limit: U256,
        max_fee_per_gas: U256,
        data: Bytes,
    ) -> ExecutionResult<u64> {
        let required = max_submission_fee.saturating_add(gas_limit.saturating_mul(max_fee_per_gas));
        if deposit_value < required {
            return Err(insufficient_value(required, deposit_value));
        }
        let payload = SubmitRetryableData {
            dest,
            l2_call_value: U256::ZERO,
            deposit_value,
            max_submission_fee,
            excess_fee_refund_address: refund,
            call_value_refund_address: refund,
            gas_limit,
            max_fee_per_gas,
            data,
        }
        .encode();
        Ok(self.deliver(env, outcome, L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX, sender, payload))
    }

    fn deposit(
        &mut self,
        env: &L1Env<'_>,
        outcome: &mut L1Outcome,
        from: Address,
        call: IL1GatewayRouter::outboundTransferCall,
        value: U256,
    ) -> ExecutionResult<()> {
        let gateway = self.router.get(&call.token).copied().unwrap_or(L1_ERC20_GATEWAY);
        let counterpart = if gateway == L1_CUSTOM_GATEWAY {
            if !self.custom_gateway.contains_key(&call.token) {
                return Err(ExecutionError::revert("NO_L2_TOKEN_SET"));
            }
            L2_CUSTOM_GATEWAY
        } else {
            self.standard_bridged.insert(call.token);
            L2_ERC20_GATEWAY
        };
        let (max_submission_cost, hook_data) =
            <(U256, Bytes)>::abi_decode_params(&call.data, true)?;

        let token =
            self.tokens.get_mut(&call.token).ok_or_else(|| ExecutionError::revert("NOT_A_TOKEN"))?;
        token.book.transfer_from(gateway, from, call.amount)?;

        let sequence = self.deposit_nonce;
        self.deposit_nonce += 1;
        let finalize = ITokenGateway::finalizeInboundTransferCall {
            token: call.token,
            from,
            to: call.to,
            amount: call.amount,
            data: (Bytes::new(), hook_data).abi_encode_params().into(),
        };
        // Gateways forward the whole value as the ticket deposit.
        self.create_retryable(
            env,
            outcome,
            gateway,
            counterpart,
            value,
            max_submission_cost,
            from,
            call.maxGas,
            call.gasPriceBid,
            finalize.abi_encode().into(),
        )?;
        outcome.logs.push(emit(
            gateway,
            &ITokenGateway::DepositInitiated {
                l1Token: call.token,
                _from: from,
                _to: call.to,
                _sequenceNumber: U256::from(sequence),
                _amount: call.amount,
            },
        ));
        Ok(())
    }

    fn register_custom_token(
        &mut self,
        env: &L1Env<'_>,
        outcome: &mut L1Outcome,
        l1_token: Address,
        call: ICustomToken::registerTokenOnL2Call,
        value: U256,
    ) -> ExecutionResult<()> {
        let required = call.valueForGateway.saturating_add(call.valueForRouter);
        if value < required {
            return Err(insufficient_value(required, value));
        }
        let l2_token = call.l2CustomTokenAddress;
        match self.custom_gateway.get(&l1_token) {
            Some(existing) if *existing != l2_token => {
                return Err(ExecutionError::revert("NO_UPDATE_TO_DIFFERENT_ADDR"))
            }
            _ => {}
        }

        self.custom_gateway.insert(l1_token, l2_token);
        outcome.logs.push(emit(
            L1_CUSTOM_GATEWAY,
            &ITokenGateway::TokenSet { l1Address: l1_token, l2Address: l2_token },
        ));
        let register = IL2CustomGateway::registerTokenFromL1Call {
            l1Address: vec![l1_token],
            l2Address: vec![l2_token],
        };
        self.create_retryable(
            env,
            outcome,
            L1_CUSTOM_GATEWAY,
            L2_CUSTOM_GATEWAY,
            call.valueForGateway,
            call.maxSubmissionCostForCustomGateway,
            call.creditBackAddress,
            call.maxGasForCustomGateway,
            call.gasPriceBid,
            register.abi_encode().into(),
        )?;

        self.router.insert(l1_token, L1_CUSTOM_GATEWAY);
        outcome.logs.push(emit(
            L1_ROUTER,
            &IGatewayRouter::GatewaySet { l1Token: l1_token, gateway: L1_CUSTOM_GATEWAY },
        ));
        let set_gateway = IL2GatewayRouter::setGatewayCall {
            l1Token: vec![l1_token],
            gateway: vec![L2_CUSTOM_GATEWAY],
        };
        self.create_retryable(
            env,
            outcome,
            L1_ROUTER,
            L2_ROUTER,
            call.valueForRouter,
            call.maxSubmissionCostForRouter,
            call.creditBackAddress,
            call.maxGasForRouter,
            call.gasPriceBid,
            set_gateway.abi_encode().into(),
        )?;
        Ok(())
    }

    fn execute_outbox(
        &mut self,
        outcome: &mut L1Outcome,
        call: IOutbox::executeTransactionCall,
    ) -> ExecutionResult<()> {
        let position = call.index.saturating_to::<u64>();
        if self.spent.contains(&position) {
            return Err(ExecutionError::revert("ALREADY_SPENT"));
        }
        let item = outbox_item_hash(
            call.l2Sender,
            call.to,
            call.l2Block,
            call.l1Block,
            call.l2Timestamp,
            call.value,
            &call.data,
        );
        let proof = OutboxProof { position, send: item, root: B256::ZERO, proof: call.proof };
        let root = proof.calculate_root(item).ok_or_else(|| ExecutionError::revert("BAD_PROOF"))?;
        let known = self
            .assertions
            .iter()
            .any(|assertion| assertion.send_root == root && position < assertion.send_count);
        if !known {
            return Err(ExecutionError::revert("UNKNOWN_ROOT"));
        }
        self.spent.insert(position);

        let gateway_call =
            selector(&call.data) == ITokenGateway::finalizeInboundTransferCall::SELECTOR;
        if gateway_call && (call.to == L1_ERC20_GATEWAY || call.to == L1_CUSTOM_GATEWAY) {
            let counterpart =
                if call.to == L1_ERC20_GATEWAY { L2_ERC20_GATEWAY } else { L2_CUSTOM_GATEWAY };
            if call.l2Sender != counterpart {
                return Err(ExecutionError::revert("ONLY_COUNTERPART_GATEWAY"));
            }
            let finalize =
                ITokenGateway::finalizeInboundTransferCall::abi_decode(&call.data, true)?;
            let (exit_num, _) = <(U256, Bytes)>::abi_decode_params(&finalize.data, true)?;
            let token = self
                .tokens
                .get_mut(&finalize.token)
                .ok_or_else(|| ExecutionError::revert("NOT_A_TOKEN"))?;
            token.book.transfer(call.to, finalize.to, finalize.amount)?;
            outcome.logs.push(emit(
                call.to,
                &ITokenGateway::WithdrawalFinalized {
                    l1Token: finalize.token,
                    _from: finalize.from,
                    _to: finalize.to,
                    _exitNum: exit_num,
                    _amount: finalize.amount,
                },
            ));
        }

        outcome.logs.push(emit(
            OUTBOX,
            &IOutbox::OutBoxTransactionExecuted {
                to: call.to,
                l2Sender: call.l2Sender,
                zero: U256::ZERO,
                transactionIndex: call.index,
            },
        ));
        Ok(())
    }

    /// Answers a read-only call.
    pub(crate) fn call(
        &self,
        env: &L1Env<'_>,
        to: Address,
        input: &[u8],
    ) -> ExecutionResult<Bytes> {
        let sel = selector(input);
        let output = if to == OUTBOX && sel == IOutbox::isSpentCall::SELECTOR {
            let call = IOutbox::isSpentCall::abi_decode(input, true)?;
            let spent = self.spent.contains(&call.index.saturating_to::<u64>());
            IOutbox::isSpentCall::abi_encode_returns(&(spent,))
        } else if to == ROLLUP && sel == IRollup::latestConfirmedCall::SELECTOR {
            IRollup::latestConfirmedCall::abi_encode_returns(&(self.assertions.len() as u64,))
        } else if to == ROLLUP && sel == IRollup::getNodeCreationBlockForLogLookupCall::SELECTOR {
            let call = IRollup::getNodeCreationBlockForLogLookupCall::abi_decode(input, true)?;
            let created = match call.nodeNum {
                0 => 0,
                num => self
                    .assertions
                    .get(num as usize - 1)
                    .map(|assertion| assertion.created_at_block)
                    .ok_or_else(|| ExecutionError::revert("NO_NODE"))?,
            };
            let created = U256::from(created);
            IRollup::getNodeCreationBlockForLogLookupCall::abi_encode_returns(&(created,))
        } else if to == L1_ROUTER {
            router_view(input, &self.router, L1_ERC20_GATEWAY)?
        } else if to == L1_ERC20_GATEWAY || to == L1_CUSTOM_GATEWAY {
            let token = gateway_view_token(input)?;
            let l2_token = if to == L1_CUSTOM_GATEWAY {
                self.custom_gateway.get(&token).copied().unwrap_or_default()
            } else if sel == ITokenGateway::calculateL2TokenAddressCall::SELECTOR
                || self.standard_bridged.contains(&token)
            {
                env.network.standard_l2_token_address(token)
            } else {
                Address::ZERO
            };
            (l2_token,).abi_encode_params()
        } else if let Some(token) = self.tokens.get(&to) {
            balance_view(input, &token.book)?
        } else {
            return Err(ExecutionError::revert("call to non-contract"));
        };
        Ok(output.into())
    }
}

/// Answers the read surface of a gateway router mapping tokens to gateways.
pub(crate) fn router_view(
    input: &[u8],
    routes: &HashMap<Address, Address>,
    default_gateway: Address,
) -> ExecutionResult<Vec<u8>> {
    let sel = selector(input);
    if sel == IGatewayRouter::l1TokenToGatewayCall::SELECTOR {
        let call = IGatewayRouter::l1TokenToGatewayCall::abi_decode(input, true)?;
        let gateway = routes.get(&call.token).copied().unwrap_or_default();
        Ok(IGatewayRouter::l1TokenToGatewayCall::abi_encode_returns(&(gateway,)))
    } else if sel == IGatewayRouter::getGatewayCall::SELECTOR {
        let call = IGatewayRouter::getGatewayCall::abi_decode(input, true)?;
        let gateway = routes.get(&call.token).copied().unwrap_or(default_gateway);
        Ok(IGatewayRouter::getGatewayCall::abi_encode_returns(&(gateway,)))
    } else if sel == IGatewayRouter::defaultGatewayCall::SELECTOR {
        Ok(IGatewayRouter::defaultGatewayCall::abi_encode_returns(&(default_gateway,)))
    } else {
        Err(ExecutionError::revert("unknown router method"))
    }
}

/// Decodes the token argument of `l1ToL2Token` or `calculateL2TokenAddress`.
pub(crate) fn gateway_view_token(input: &[u8]) -> ExecutionResult<Address> {
    let sel = selector(input);
    if sel == ITokenGateway::l1ToL2TokenCall::SELECTOR {
        Ok(ITokenGateway::l1ToL2TokenCall::abi_decode(input, true)?.l1Token)
    } else if sel == ITokenGateway::calculateL2TokenAddressCall::SELECTOR {
        Ok(ITokenGateway::calculateL2TokenAddressCall::abi_decode(input, true)?.l1Token)
    } else {
        Err(ExecutionError::revert("unknown gateway method"))
    }
}

/// Answers `balanceOf` against `book`.
pub(crate) fn balance_view(input: &[u8], book: &Erc20) -> ExecutionResult<Vec<u8>> {
    let call = IERC20::balanceOfCall::abi_decode(input, true)?;
    Ok(IERC20::balanceOfCall::abi_encode_returns(&(book.balance_of(call.account),)))
}
