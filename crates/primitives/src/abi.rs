//! Solidity bindings for every contract surface the bridge core reads from or submits to.
//!
//! Parent chain: `Bridge`, `Inbox`, `Rollup`, `Outbox`, the gateway router and gateways.
//! Child chain: the `ArbSys`, `ArbRetryableTx` and `NodeInterface` precompiles, the gateway router
//! and gateways.

use alloy_sol_types::sol;

sol! {
    /// The parent chain bridge. Every message accepted by the inbox is recorded here.
    interface IBridge {
        /// Emitted for every message appended to the delayed inbox.
        event MessageDelivered(
            uint256 indexed messageIndex,
            bytes32 indexed beforeInboxAcc,
            address inbox,
            uint8 kind,
            address sender,
            bytes32 messageDataHash,
            uint256 baseFeeL1,
            uint64 timestamp
        );
    }

    /// The parent chain delayed inbox.
    interface IInbox {
        /// Emitted alongside [IBridge::MessageDelivered] with the full message payload.
        event InboxMessageDelivered(uint256 indexed messageNum, bytes data);

        /// Deposits the attached value to the sender's account on the child chain.
        function depositEth() external payable returns (uint256 messageNum);

        /// Schedules a retryable ticket on the child chain.
        function createRetryableTicket(
            address to,
            uint256 l2CallValue,
            uint256 maxSubmissionCost,
            address excessFeeRefundAddress,
            address callValueRefundAddress,
            uint256 gasLimit,
            uint256 maxFeePerGas,
            bytes data
        ) external payable returns (uint256 messageNum);
    }

    /// The parent chain rollup contract holding assertions over child chain state.
    interface IRollup {
        /// Emitted once an assertion has passed its challenge period.
        event NodeConfirmed(uint64 indexed nodeNum, bytes32 blockHash, bytes32 sendRoot);

        /// The most recently confirmed assertion.
        function latestConfirmed() external view returns (uint64 nodeNum);

        /// The parent chain block an assertion was created in. Its confirmation is logged at or
        /// after this block.
        function getNodeCreationBlockForLogLookup(uint64 nodeNum)
            external
            view
            returns (uint256 blockNumber);
    }

    /// The parent chain outbox executing child-to-parent messages.
    interface IOutbox {
        /// Emitted when a message has been executed.
        event OutBoxTransactionExecuted(
            address indexed to,
            address indexed l2Sender,
            uint256 indexed zero,
            uint256 transactionIndex
        );

        /// Executes a message proven against a confirmed send root.
        function executeTransaction(
            bytes32[] proof,
            uint256 index,
            address l2Sender,
            address to,
            uint256 l2Block,
            uint256 l1Block,
            uint256 l2Timestamp,
            uint256 value,
            bytes data
        ) external;

        /// Whether the message at the given position has been executed.
        function isSpent(uint256 index) external view returns (bool spent);
    }

    /// The `ArbSys` precompile.
    interface IArbSys {
        /// Emitted for every child-to-parent message.
        event L2ToL1Tx(
            address caller,
            address indexed destination,
            uint256 indexed hash,
            uint256 indexed position,
            uint256 arbBlockNum,
            uint256 ethBlockNum,
            uint256 timestamp,
            uint256 callvalue,
            bytes data
        );

        /// Sends a message to the parent chain.
        function sendTxToL1(address destination, bytes data)
            external
            payable
            returns (uint256 position);
    }

    /// The `ArbRetryableTx` precompile.
    interface IArbRetryableTx {
        /// Emitted when a retryable ticket is created.
        event TicketCreated(bytes32 indexed ticketId);

        /// Emitted when a redeem attempt of a ticket has been scheduled.
        event RedeemScheduled(
            bytes32 indexed ticketId,
            bytes32 indexed retryTxHash,
            uint64 indexed sequenceNum,
            uint64 donatedGas,
            address gasDonor,
            uint256 maxRefund,
            uint256 submissionFeeRefund
        );

        /// Emitted when a ticket has been cancelled by its beneficiary.
        event Canceled(bytes32 indexed ticketId);

        /// Emitted when the lifetime of a ticket has been extended.
        event LifetimeExtended(bytes32 indexed ticketId, uint256 newTimeout);

        /// Reverted with when the ticket does not exist (never created, redeemed, or expired).
        error NoTicketWithID();

        /// Schedules a redeem attempt for the ticket.
        function redeem(bytes32 ticketId) external returns (bytes32 retryTxHash);

        /// Cancels the ticket and refunds its call value.
        function cancel(bytes32 ticketId) external;

        /// Extends the lifetime of the ticket by one lifetime period.
        function keepalive(bytes32 ticketId) external returns (uint256 newTimeout);

        /// The timestamp at which the ticket expires.
        function getTimeout(bytes32 ticketId) external view returns (uint256 timeout);

        /// The default lifetime of a new ticket, in seconds.
        function getLifetime() external view returns (uint256 lifetime);
    }

    /// The `NodeInterface` virtual contract.
    interface INodeInterface {
        /// Builds the merkle proof of `leaf` in the send accumulator of size `size`.
        function constructOutboxProof(uint64 size, uint64 leaf)
            external
            view
            returns (bytes32 send, bytes32 root, bytes32[] proof);
    }

    /// The read surface shared by the gateway routers on both chains.
    interface IGatewayRouter {
        /// Emitted when the gateway of a token changes.
        event GatewaySet(address indexed l1Token, address indexed gateway);

        /// The gateway explicitly registered for the token, or the zero address.
        function l1TokenToGateway(address token) external view returns (address gateway);

        /// The gateway that will handle the token, falling back to the default gateway.
        function getGateway(address token) external view returns (address gateway);

        /// The gateway used for tokens without an explicit registration.
        function defaultGateway() external view returns (address gateway);
    }

    /// The parent chain gateway router.
    interface IL1GatewayRouter {
        /// Deposits `amount` of `token` through the token's gateway.
        function outboundTransfer(
            address token,
            address to,
            uint256 amount,
            uint256 maxGas,
            uint256 gasPriceBid,
            bytes data
        ) external payable returns (bytes res);
    }

    /// The child chain gateway router.
    interface IL2GatewayRouter {
        /// Registers gateways for tokens. Only callable by the aliased parent chain router.
        function setGateway(address[] l1Token, address[] gateway) external;

        /// Withdraws `amount` of the child chain counterpart of `l1Token`.
        function outboundTransfer(address l1Token, address to, uint256 amount, bytes data)
            external
            payable
            returns (bytes res);
    }

    /// The token gateway surface shared by standard and custom gateways on both chains.
    interface ITokenGateway {
        /// Emitted by the parent chain gateway when a deposit is initiated.
        event DepositInitiated(
            address l1Token,
            address indexed _from,
            address indexed _to,
            uint256 indexed _sequenceNumber,
            uint256 _amount
        );

        /// Emitted by the child chain gateway when a deposit has been minted.
        event DepositFinalized(
            address indexed l1Token,
            address indexed _from,
            address indexed _to,
            uint256 _amount
        );

        /// Emitted by the child chain gateway when a withdrawal is initiated.
        event WithdrawalInitiated(
            address l1Token,
            address indexed _from,
            address indexed _to,
            uint256 indexed _l2ToL1Id,
            uint256 _exitNum,
            uint256 _amount
        );

        /// Emitted by the parent chain gateway when a withdrawal has been released.
        event WithdrawalFinalized(
            address l1Token,
            address indexed _from,
            address indexed _to,
            uint256 indexed _exitNum,
            uint256 _amount
        );

        /// Emitted by a custom gateway when a token mapping is registered.
        event TokenSet(address indexed l1Address, address indexed l2Address);

        /// The registered child chain counterpart of `l1Token`, or the zero address.
        function l1ToL2Token(address l1Token) external view returns (address l2Token);

        /// The child chain counterpart of `l1Token` as computed by this gateway.
        function calculateL2TokenAddress(address l1Token) external view returns (address l2Token);

        /// Completes a transfer arriving from the other chain.
        function finalizeInboundTransfer(
            address token,
            address from,
            address to,
            uint256 amount,
            bytes data
        ) external payable;
    }

    /// The child chain custom gateway registration entrypoint.
    interface IL2CustomGateway {
        /// Registers token mappings. Only callable by the aliased parent chain custom gateway.
        function registerTokenFromL1(address[] l1Address, address[] l2Address) external;
    }

    /// A parent chain token that registers itself with the custom gateway.
    interface ICustomToken {
        /// Schedules both registration messages (custom gateway, then router) in one transaction.
        function registerTokenOnL2(
            address l2CustomTokenAddress,
            uint256 maxSubmissionCostForCustomGateway,
            uint256 maxSubmissionCostForRouter,
            uint256 maxGasForCustomGateway,
            uint256 maxGasForRouter,
            uint256 gasPriceBid,
            uint256 valueForGateway,
            uint256 valueForRouter,
            address creditBackAddress
        ) external payable;
    }

    /// The ERC-20 surface needed to move tokens through a gateway.
    interface IERC20 {
        /// The token balance of `account`.
        function balanceOf(address account) external view returns (uint256 balance);

        /// Approves `spender` to move `amount` tokens of the caller.
        function approve(address spender, uint256 amount) external returns (bool success);
    }
}
