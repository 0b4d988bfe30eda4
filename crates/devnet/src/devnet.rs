//! The [Devnet]: both chains, their contract state and the message relay between them.

use crate::{
    addresses::{
        network, L1_DEPLOYER, L2_DEPLOYER, RETRYABLE_LIFETIME_SECONDS, ROLLUP, USER, VALIDATOR,
    },
    chain::{Chain, MinedTx},
    emit,
    l1::{DeliveredMessage, L1Env, L1State, L1Token},
    l2::{creation_logs, L2Env, L2State, ScheduledRetry, Ticket},
    DevnetProvider, ExecutionError, ExecutionResult, L1_CHAIN_ID,
};
use alloy_consensus::Header;
use alloy_primitives::{Address, Bytes, B256, U256};
use nitro_bridge_primitives::{
    abi::IRollup, eth_deposit_tx_id, submit_retryable_id, ArbHeaderInfo, EthDepositData, L2Network,
    SubmitRetryableData, TransactionReceipt, TransactionRequest, ARB_RETRYABLE_TX_ADDRESS,
    L1_MESSAGE_TYPE_ETH_DEPOSIT, L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX,
};
use nitro_bridge_providers::{FilteredLog, LogFilter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// The gas a transaction gets when its request leaves the limit unset.
const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// The gas a retryable redeem needs to execute its call.
const DEFAULT_RETRY_GAS_COST: u64 = 100_000;

/// One side of the devnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    L1,
    L2,
}

#[derive(Debug)]
pub(crate) struct DevnetState {
    l1: Chain,
    l2: Chain,
    l1_state: L1State,
    l2_state: L2State,
    network: L2Network,
    pub(crate) offline: bool,
    pub(crate) log_range_limit: Option<u64>,
    submission_fee: U256,
    retry_gas_cost: u64,
    deployed: u64,
}

impl DevnetState {
    fn new() -> Self {
        let network = network(RETRYABLE_LIFETIME_SECONDS, None);
        let l2_state = L2State::default();
        Self {
            l1: Chain::new(L1_CHAIN_ID, None),
            l2: Chain::new(network.chain_id, Some(l2_state.header_info(0))),
            l1_state: L1State::default(),
            l2_state,
            network,
            offline: false,
            log_range_limit: None,
            submission_fee: U256::ZERO,
            retry_gas_cost: DEFAULT_RETRY_GAS_COST,
            deployed: 0,
        }
    }

    fn chain(&self, side: Side) -> &Chain {
        match side {
            Side::L1 => &self.l1,
            Side::L2 => &self.l2,
        }
    }

    pub(crate) fn block_number(&self, side: Side) -> u64 {
        self.chain(side).head_number()
    }

    pub(crate) fn header_by_number(&self, side: Side, number: u64) -> Option<Header> {
        self.chain(side).header_by_number(number)
    }

    pub(crate) fn header_by_hash(&self, side: Side, hash: B256) -> Option<Header> {
        self.chain(side).header_by_hash(hash)
    }

    pub(crate) fn receipt(&self, side: Side, hash: B256) -> Option<TransactionReceipt> {
        self.chain(side).receipt(hash)
    }

    pub(crate) fn logs(
        &self,
        side: Side,
        filter: &LogFilter,
        from: u64,
        to: u64,
    ) -> Vec<FilteredLog> {
        self.chain(side).logs(filter, from, to)
    }

    pub(crate) fn call(&self, side: Side, to: Address, input: &[u8]) -> ExecutionResult<Bytes> {
        match side {
            Side::L1 => {
                let env = L1Env { timestamp: self.l1.head_timestamp(), network: &self.network };
                self.l1_state.call(&env, to, input)
            }
            Side::L2 => self.l2_state.call(&self.network, self.l2.head_timestamp(), to, input),
        }
    }

    pub(crate) fn send(&mut self, side: Side, from: Address, request: TransactionRequest) -> B256 {
        match side {
            Side::L1 => self.send_l1(from, request),
            Side::L2 => self.send_l2(from, request),
        }
    }

    fn send_l1(&mut self, from: Address, request: TransactionRequest) -> B256 {
        let hash = self.l1.next_tx_hash(from);
        let snapshot = self.l1_state.clone();
        let env = L1Env { timestamp: self.l1.next_timestamp(), network: &self.network };
        let result = self.l1_state.execute(&env, from, request.to, &request.input, request.value);

        let (status, logs, delivered) = match result {
            Ok(outcome) => (true, outcome.logs, outcome.delivered),
            Err(err) => {
                debug!(target: "devnet", %hash, %err, "Parent chain transaction reverted");
                self.l1_state = snapshot;
                (false, Vec::new(), Vec::new())
            }
        };
        self.l1.mine(MinedTx { hash, from, to: request.to, status, logs }, None);
        for message in delivered {
            self.relay(message);
        }
        hash
    }

    fn send_l2(&mut self, from: Address, request: TransactionRequest) -> B256 {
        let hash = self.l2.next_tx_hash(from);
        let snapshot = self.l2_state.clone();
        let env = L2Env {
            number: self.l2.next_number(),
            timestamp: self.l2.next_timestamp(),
            l1_block: self.l1.head_number(),
            gas: U256::from(request.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT)),
            network: &self.network,
        };
        let result = self.l2_state.execute(&env, from, request.to, &request.input, request.value);

        let (status, logs, retry) = match result {
            Ok(outcome) => (true, outcome.logs, outcome.retry),
            Err(err) => {
                debug!(target: "devnet", %hash, %err, "Child chain transaction reverted");
                self.l2_state = snapshot;
                (false, Vec::new(), None)
            }
        };
        self.mine_l2(MinedTx { hash, from, to: request.to, status, logs });
        if let Some(retry) = retry {
            self.run_retry(retry);
        }
        hash
    }

    fn mine_l2(&mut self, tx: MinedTx) -> TransactionReceipt {
        let info = self.l2_state.header_info(self.l1.head_number());
        self.l2.mine(tx, Some(info))
    }

    fn mine_l2_empty(&mut self) {
        let info = self.l2_state.header_info(self.l1.head_number());
        self.l2.mine_empty(Some(info));
    }

    /// Executes a delayed inbox message on the child chain.
    fn relay(&mut self, message: DeliveredMessage) {
        match message.kind {
            L1_MESSAGE_TYPE_ETH_DEPOSIT => {
                let data = match EthDepositData::decode(message.index, &message.payload) {
                    Ok(data) => data,
                    Err(err) => {
                        warn!(
                            target: "devnet",
                            index = message.index,
                            %err,
                            "Dropping malformed deposit"
                        );
                        return;
                    }
                };
                let hash =
                    eth_deposit_tx_id(self.network.chain_id, message.index, message.sender, &data);
                self.mine_l2(MinedTx {
                    hash,
                    from: message.sender,
                    to: data.dest,
                    status: true,
                    logs: Vec::new(),
                });
                debug!(target: "devnet", index = message.index, %hash, "Relayed ETH deposit");
            }
            L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX => self.create_ticket(message),
            kind => debug!(target: "devnet", index = message.index, kind, "Ignoring inbox message"),
        }
    }

    fn create_ticket(&mut self, message: DeliveredMessage) {
        let data = match SubmitRetryableData::decode(message.index, &message.payload) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    target: "devnet",
                    index = message.index,
                    %err,
                    "Dropping malformed retryable"
                );
                return;
            }
        };
        let ticket_id = submit_retryable_id(
            self.network.chain_id,
            message.index,
            message.sender,
            message.base_fee,
            &data,
        );
        let creation = |status, logs| MinedTx {
            hash: ticket_id,
            from: message.sender,
            to: ARB_RETRYABLE_TX_ADDRESS,
            status,
            logs,
        };

        if data.max_submission_fee < self.submission_fee {
            warn!(
                target: "devnet",
                %ticket_id,
                "Retryable creation failed: submission fee too low"
            );
            self.mine_l2(creation(false, Vec::new()));
            return;
        }
        if data.data.is_empty() {
            self.mine_l2(creation(true, Vec::new()));
            return;
        }

        let (logs, retry) =
            creation_logs(ticket_id, data.gas_limit, data.excess_fee_refund_address);
        let ticket = Ticket {
            from: message.sender,
            to: data.dest,
            value: data.l2_call_value,
            data: data.data,
            beneficiary: data.call_value_refund_address,
            timeout: self.l2.next_timestamp() + self.network.retryable_lifetime_seconds,
            tries: u64::from(retry.is_some()),
        };
        self.l2_state.tickets.insert(ticket_id, ticket);
        self.mine_l2(creation(true, logs));
        info!(target: "devnet", %ticket_id, index = message.index, "Created retryable ticket");

        if let Some(retry) = retry {
            self.run_retry(retry);
        }
    }

    /// Executes a scheduled redeem in its own block. A successful redeem deletes the ticket.
    fn run_retry(&mut self, retry: ScheduledRetry) {
        let Some(ticket) = self.l2_state.tickets.get(&retry.ticket_id).cloned() else {
            return;
        };
        let snapshot = self.l2_state.clone();
        let result = if retry.gas < U256::from(self.retry_gas_cost) {
            Err(ExecutionError::revert("out of gas"))
        } else {
            let env = L2Env {
                number: self.l2.next_number(),
                timestamp: self.l2.next_timestamp(),
                l1_block: self.l1.head_number(),
                gas: retry.gas,
                network: &self.network,
            };
            self.l2_state.execute(&env, ticket.from, ticket.to, &ticket.data, ticket.value)
        };

        let (status, logs) = match result {
            Ok(outcome) => {
                self.l2_state.tickets.remove(&retry.ticket_id);
                info!(
                    target: "devnet",
                    ticket_id = %retry.ticket_id,
                    retry = %retry.hash,
                    "Redeemed retryable ticket"
                );
                (true, outcome.logs)
            }
            Err(err) => {
                self.l2_state = snapshot;
                warn!(
                    target: "devnet",
                    ticket_id = %retry.ticket_id,
                    retry = %retry.hash,
                    %err,
                    "Redeem failed"
                );
                (false, Vec::new())
            }
        };
        self.mine_l2(MinedTx { hash: retry.hash, from: ticket.from, to: ticket.to, status, logs });
    }

    fn confirm_assertion(&mut self) -> u64 {
        let block_hash = self.l2.head_hash();
        let info = self
            .l2
            .header_by_number(self.l2.head_number())
            .and_then(|header| ArbHeaderInfo::from_header(&header))
            .unwrap_or_default();
        self.l1_state.assertions.push(crate::l1::Assertion {
            created_at_block: self.l1.next_number(),
            send_root: info.send_root,
            send_count: info.send_count,
        });
        let node_num = self.l1_state.assertions.len() as u64;

        let log = emit(
            ROLLUP,
            &IRollup::NodeConfirmed {
                nodeNum: node_num,
                blockHash: block_hash,
                sendRoot: info.send_root,
            },
        );
        let hash = self.l1.next_tx_hash(VALIDATOR);
        let tx = MinedTx { hash, from: VALIDATOR, to: ROLLUP, status: true, logs: vec![log] };
        self.l1.mine(tx, None);
        info!(
            target: "devnet",
            node_num,
            %block_hash,
            send_count = info.send_count,
            "Confirmed assertion"
        );
        node_num
    }
}

/// An in-process parent/child chain pair.
///
/// Clones share the same chains. Every method takes `&self`.
#[derive(Debug, Clone)]
pub struct Devnet {
    state: Arc<Mutex<DevnetState>>,
}

impl Default for Devnet {
    fn default() -> Self {
        Self::new()
    }
}

impl Devnet {
    /// Creates both chains at genesis with the token bridge deployed.
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(DevnetState::new())) }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DevnetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A parent chain provider signing as [USER].
    pub fn l1(&self) -> DevnetProvider {
        self.l1_signer(USER)
    }

    /// A child chain provider signing as [USER].
    pub fn l2(&self) -> DevnetProvider {
        self.l2_signer(USER)
    }

    /// A parent chain provider signing as `address`.
    pub fn l1_signer(&self, address: Address) -> DevnetProvider {
        DevnetProvider::new(self.clone(), Side::L1, address)
    }

    /// A child chain provider signing as `address`.
    pub fn l2_signer(&self, address: Address) -> DevnetProvider {
        DevnetProvider::new(self.clone(), Side::L2, address)
    }

    /// The network description of the devnet.
    pub fn network(&self) -> L2Network {
        self.state().network.clone()
    }

    /// Deploys a plain ERC-20 on the parent chain.
    pub fn deploy_token(&self) -> Address {
        let mut state = self.state();
        let address = L1_DEPLOYER.create(state.deployed);
        state.deployed += 1;
        state.l1_state.tokens.insert(address, L1Token::default());
        address
    }

    /// Deploys a parent chain token able to register itself with the custom gateway, together
    /// with its child chain counterpart. Returns both addresses.
    pub fn deploy_custom_token(&self) -> (Address, Address) {
        let mut state = self.state();
        let nonce = state.deployed;
        state.deployed += 1;
        let l1_token = L1_DEPLOYER.create(nonce);
        let l2_token = L2_DEPLOYER.create(nonce);
        state.l1_state.tokens.insert(l1_token, L1Token { custom: true, ..Default::default() });
        state.l2_state.tokens.insert(l2_token, Default::default());
        (l1_token, l2_token)
    }

    /// Mints `amount` of the parent chain `token` to `to`.
    pub fn mint_l1(&self, token: Address, to: Address, amount: U256) {
        if let Some(token) = self.state().l1_state.tokens.get_mut(&token) {
            token.book.mint(to, amount);
        }
    }

    /// The balance of `account` in the parent chain `token`.
    pub fn l1_balance(&self, token: Address, account: Address) -> U256 {
        self.state()
            .l1_state
            .tokens
            .get(&token)
            .map(|t| t.book.balance_of(account))
            .unwrap_or_default()
    }

    /// The balance of `account` in the child chain `token`.
    pub fn l2_balance(&self, token: Address, account: Address) -> U256 {
        self.state().l2_state.tokens.get(&token).map(|t| t.balance_of(account)).unwrap_or_default()
    }

    /// Confirms an assertion over the current child chain head, returning its node number.
    pub fn confirm_assertion(&self) -> u64 {
        self.state().confirm_assertion()
    }

    /// Mines `count` empty parent chain blocks.
    pub fn mine_l1_blocks(&self, count: u64) {
        let mut state = self.state();
        for _ in 0..count {
            state.l1.mine_empty(None);
        }
    }

    /// Advances child chain time by `seconds` and mines an empty block.
    pub fn advance_l2_time(&self, seconds: u64) {
        let mut state = self.state();
        state.l2.advance_time(seconds);
        state.mine_l2_empty();
    }

    /// Replaces child chain block `number` and its descendants with siblings.
    pub fn reorg_l2_block(&self, number: u64) {
        self.state().l2.reorg(number);
        warn!(target: "devnet", number, "Reorged child chain");
    }

    /// Sets the parent chain block window after which unconfirmed outbox messages expire.
    pub fn set_outbox_expiry_blocks(&self, blocks: Option<u64>) {
        self.state().network.outbox_expiry_blocks = blocks;
    }

    /// Sets the minimum submission cost a retryable must pay to be created.
    pub fn set_submission_fee(&self, fee: U256) {
        self.state().submission_fee = fee;
    }

    /// Sets the gas a redeem needs to execute its call.
    pub fn set_retry_gas_cost(&self, gas: u64) {
        self.state().retry_gas_cost = gas;
    }

    /// Rejects `getLogs` requests covering more than `limit` blocks.
    pub fn set_log_range_limit(&self, limit: Option<u64>) {
        self.state().log_range_limit = limit;
    }

    /// Makes every provider request fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }
}
