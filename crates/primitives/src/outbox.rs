//! Child-to-parent messages and the send merkle accumulator that proves them.

use crate::{
    abi::IArbSys, CrossDomainMessage, MessageOrigin, MessageStatus, TransactionReceipt,
    ARB_SYS_ADDRESS,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolEvent;
use core::fmt::{self, Display};

/// The maximum proof length accepted by the outbox.
pub const MAX_PROOF_LENGTH: usize = 255;

/// The lifecycle of a child-to-parent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum L2ToL1MessageStatus {
    /// The originating child chain block is not covered by a confirmed assertion yet.
    Unconfirmed,
    /// Covered by a confirmed assertion and executable on the parent chain.
    Confirmed,
    /// Executed by the outbox.
    Executed,
    /// The confirmation window lapsed without a confirmation.
    Expired,
}

impl Display for L2ToL1MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfirmed => "UNCONFIRMED",
            Self::Confirmed => "CONFIRMED",
            Self::Executed => "EXECUTED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

impl MessageStatus for L2ToL1MessageStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Expired)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Unconfirmed => 0,
            Self::Confirmed => 1,
            Self::Executed | Self::Expired => 2,
        }
    }
}

/// A child-to-parent message decoded from an `ArbSys` `L2ToL1Tx` log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct OutboxMessage {
    /// Where the message was observed on the child chain. The sequence number is the position
    /// of the message in the send accumulator.
    pub origin: MessageOrigin,
    /// The child chain account that sent the message.
    pub caller: Address,
    /// The parent chain call target.
    pub destination: Address,
    /// The item hash of the message, as recorded by `ArbSys`.
    pub hash: B256,
    /// The position of the message in the send accumulator.
    pub position: u64,
    /// The child chain block number the message was sent in.
    pub arb_block_num: U256,
    /// The parent chain block number the child chain block was derived from.
    pub eth_block_num: U256,
    /// The child chain timestamp.
    pub timestamp: U256,
    /// The value released to `destination`.
    pub callvalue: U256,
    /// The calldata executed against `destination`.
    pub data: Bytes,
}

impl OutboxMessage {
    /// Computes the item hash of the message from its fields.
    pub fn item_hash(&self) -> B256 {
        outbox_item_hash(
            self.caller,
            self.destination,
            self.arb_block_num,
            self.eth_block_num,
            self.timestamp,
            self.callvalue,
            &self.data,
        )
    }
}

impl CrossDomainMessage for OutboxMessage {
    type Status = L2ToL1MessageStatus;

    fn origin(&self) -> &MessageOrigin {
        &self.origin
    }

    fn payload(&self) -> &Bytes {
        &self.data
    }
}

/// Extracts every child-to-parent message sent by `receipt`, in log order.
pub fn extract_outbox_messages(
    receipt: &TransactionReceipt,
) -> Result<Vec<OutboxMessage>, alloy_sol_types::Error> {
    let mut messages = Vec::new();
    for log in receipt.logs_from(ARB_SYS_ADDRESS) {
        if log.topics().first() != Some(&IArbSys::L2ToL1Tx::SIGNATURE_HASH) {
            continue;
        }
        let event = IArbSys::L2ToL1Tx::decode_log_data(&log.data, true)?;
        let position = event.position.saturating_to::<u64>();
        messages.push(OutboxMessage {
            origin: MessageOrigin {
                tx_hash: receipt.transaction_hash,
                block_hash: receipt.block_hash,
                block_number: receipt.block_number,
                sequence_number: position,
            },
            caller: event.caller,
            destination: event.destination,
            hash: B256::from(event.hash.to_be_bytes::<32>()),
            position,
            arb_block_num: event.arbBlockNum,
            eth_block_num: event.ethBlockNum,
            timestamp: event.timestamp,
            callvalue: event.callvalue,
            data: event.data,
        });
    }
    Ok(messages)
}

/// Computes the outbox item hash,
/// `keccak256(abi.encodePacked(l2Sender, to, l2Block, l1Block, l2Timestamp, value, data))`.
pub fn outbox_item_hash(
    l2_sender: Address,
    to: Address,
    l2_block: U256,
    l1_block: U256,
    l2_timestamp: U256,
    value: U256,
    data: &[u8],
) -> B256 {
    let mut packed = Vec::with_capacity(20 + 20 + 32 * 4 + data.len());
    packed.extend_from_slice(l2_sender.as_slice());
    packed.extend_from_slice(to.as_slice());
    packed.extend_from_slice(&l2_block.to_be_bytes::<32>());
    packed.extend_from_slice(&l1_block.to_be_bytes::<32>());
    packed.extend_from_slice(&l2_timestamp.to_be_bytes::<32>());
    packed.extend_from_slice(&value.to_be_bytes::<32>());
    packed.extend_from_slice(data);
    keccak256(packed)
}

fn hash_pair(left: B256, right: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// The inclusion proof of one message in a send root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct OutboxProof {
    /// The position of the message; its bits select the side of each sibling.
    pub position: u64,
    /// The item hash of the proven message.
    pub send: B256,
    /// The send root the proof was built against.
    pub root: B256,
    /// The sibling hashes from the leaf up.
    pub proof: Vec<B256>,
}

impl OutboxProof {
    /// Folds the proof over the leaf of `item`, returning the implied root.
    ///
    /// Returns `None` for proofs the outbox rejects: longer than [MAX_PROOF_LENGTH], or with a
    /// position that does not fit in the proof length.
    pub fn calculate_root(&self, item: B256) -> Option<B256> {
        if self.proof.len() > MAX_PROOF_LENGTH {
            return None;
        }
        if self.proof.len() < 64 && self.position >> self.proof.len() != 0 {
            return None;
        }

        let mut node = keccak256(item);
        for (i, sibling) in self.proof.iter().enumerate() {
            let right = i < 64 && (self.position >> i) & 1 == 1;
            node = if right { hash_pair(*sibling, node) } else { hash_pair(node, *sibling) };
        }
        Some(node)
    }

    /// Whether the proof proves `item` against `root`.
    pub fn verify(&self, item: B256, root: B256) -> bool {
        self.send == item && self.calculate_root(item) == Some(root)
    }
}

/// The send accumulator of a child chain: a binary merkle tree over `keccak256(item)` leaves,
/// padded with zero leaves to the next power of two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMerkleTree {
    items: Vec<B256>,
}

impl SendMerkleTree {
    /// Creates an accumulator over the given item hashes.
    pub fn new(items: Vec<B256>) -> Self {
        Self { items }
    }

    /// Appends an item hash, returning its position.
    pub fn push(&mut self, item: B256) -> u64 {
        self.items.push(item);
        self.items.len() as u64 - 1
    }

    /// The number of items in the accumulator.
    pub fn len(&self) -> u64 {
        self.items.len() as u64
    }

    /// Whether the accumulator is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The levels of the tree over the first `size` items, leaves first.
    fn levels(&self, size: usize) -> Vec<Vec<B256>> {
        let mut level: Vec<B256> = self.items[..size].iter().map(keccak256).collect();
        let width = size.next_power_of_two();
        level.resize(width, B256::ZERO);

        let mut levels = vec![level];
        while levels.last().map_or(0, Vec::len) > 1 {
            let next = levels
                .last()
                .map(|level| level.chunks(2).map(|pair| hash_pair(pair[0], pair[1])).collect())
                .unwrap_or_default();
            levels.push(next);
        }
        levels
    }

    /// The send root over the first `size` items. The root of an empty accumulator is zero.
    pub fn root(&self, size: u64) -> B256 {
        let size = (size as usize).min(self.items.len());
        if size == 0 {
            return B256::ZERO;
        }
        self.levels(size).last().and_then(|root| root.first().copied()).unwrap_or_default()
    }

    /// Builds the proof of the item at `leaf` in the accumulator of the first `size` items.
    pub fn proof(&self, size: u64, leaf: u64) -> Option<OutboxProof> {
        if leaf >= size || size > self.len() {
            return None;
        }
        let levels = self.levels(size as usize);
        let mut index = leaf as usize;
        let mut proof = Vec::with_capacity(levels.len() - 1);
        for level in &levels[..levels.len() - 1] {
            proof.push(level[index ^ 1]);
            index >>= 1;
        }
        Some(OutboxProof {
            position: leaf,
            send: self.items[leaf as usize],
            root: levels[levels.len() - 1][0],
            proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Log};
    use proptest::prelude::*;

    fn item(i: u64) -> B256 {
        keccak256(i.to_be_bytes())
    }

    #[test]
    fn test_status_lifecycle() {
        use L2ToL1MessageStatus::*;
        assert!(!Unconfirmed.is_terminal() && !Confirmed.is_terminal());
        assert!(Executed.is_terminal() && Expired.is_terminal());
        assert!(Unconfirmed.rank() < Confirmed.rank() && Confirmed.rank() < Executed.rank());
        assert_eq!(Unconfirmed.to_string(), "UNCONFIRMED");
    }

    #[test]
    fn test_single_item_tree() {
        let tree = SendMerkleTree::new(vec![item(0)]);
        let proof = tree.proof(1, 0).unwrap();
        assert!(proof.proof.is_empty());
        assert_eq!(tree.root(1), keccak256(item(0)));
        assert!(proof.verify(item(0), tree.root(1)));
    }

    #[test]
    fn test_proof_rejects_wrong_item_and_bad_position() {
        let tree = SendMerkleTree::new((0..5).map(item).collect());
        let mut proof = tree.proof(5, 3).unwrap();
        assert_eq!(proof.proof.len(), 3);
        assert!(!proof.verify(item(4), tree.root(5)));

        proof.position = 8;
        assert_eq!(proof.calculate_root(item(3)), None);
        assert!(tree.proof(5, 5).is_none());
        assert!(tree.proof(6, 0).is_none());
    }

    #[test]
    fn test_extract_outbox_message_and_item_hash() {
        let caller = address!("000000000000000000000000000000000000ca11");
        let destination = address!("000000000000000000000000000000000000de57");
        let data = Bytes::from_static(&[0xab; 4]);
        let hash = outbox_item_hash(
            caller,
            destination,
            U256::from(12),
            U256::from(3),
            U256::from(1000),
            U256::from(5),
            &data,
        );
        let log = Log {
            address: ARB_SYS_ADDRESS,
            data: IArbSys::L2ToL1Tx {
                caller,
                destination,
                hash: U256::from_be_bytes(hash.0),
                position: U256::from(7),
                arbBlockNum: U256::from(12),
                ethBlockNum: U256::from(3),
                timestamp: U256::from(1000),
                callvalue: U256::from(5),
                data: data.clone(),
            }
            .encode_log_data(),
        };
        let receipt = TransactionReceipt {
            transaction_hash: B256::repeat_byte(1),
            block_hash: B256::repeat_byte(2),
            block_number: 12,
            from: caller,
            to: Some(ARB_SYS_ADDRESS),
            status: true,
            logs: vec![log],
        };

        let messages = extract_outbox_messages(&receipt).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].position, 7);
        assert_eq!(messages[0].id().sequence_number, 7);
        assert_eq!(messages[0].hash, hash);
        assert_eq!(messages[0].item_hash(), hash);
    }

    fn send_log(emitter: Address, position: u64) -> Log {
        Log {
            address: emitter,
            data: IArbSys::L2ToL1Tx {
                caller: address!("000000000000000000000000000000000000ca11"),
                destination: address!("000000000000000000000000000000000000de57"),
                hash: U256::from(position + 100),
                position: U256::from(position),
                arbBlockNum: U256::from(12),
                ethBlockNum: U256::from(3),
                timestamp: U256::from(1000),
                callvalue: U256::ZERO,
                data: Bytes::from(vec![position as u8]),
            }
            .encode_log_data(),
        }
    }

    #[test]
    fn test_batched_sends_keep_emission_order() {
        let unrelated = Log {
            address: ARB_SYS_ADDRESS,
            data: alloy_primitives::LogData::new_unchecked(
                vec![B256::repeat_byte(0x77)],
                Bytes::new(),
            ),
        };
        let impostor = send_log(address!("0000000000000000000000000000000000000bad"), 99);
        let receipt = TransactionReceipt {
            transaction_hash: B256::repeat_byte(1),
            block_hash: B256::repeat_byte(2),
            block_number: 12,
            from: Address::ZERO,
            to: Some(ARB_SYS_ADDRESS),
            status: true,
            logs: vec![
                send_log(ARB_SYS_ADDRESS, 4),
                unrelated,
                send_log(ARB_SYS_ADDRESS, 5),
                impostor,
                send_log(ARB_SYS_ADDRESS, 6),
            ],
        };

        let messages = extract_outbox_messages(&receipt).unwrap();
        let positions = messages.iter().map(|message| message.position).collect::<Vec<_>>();
        assert_eq!(positions, vec![4, 5, 6]);
        let payloads = messages.iter().map(|message| message.data[0]).collect::<Vec<_>>();
        assert_eq!(payloads, vec![4, 5, 6]);
        assert!(messages
            .iter()
            .all(|message| message.id().origin_tx_hash == B256::repeat_byte(1)));
    }

    proptest! {
        #[test]
        fn test_every_proof_verifies(size in 1u64..40, leaf_seed in any::<u64>()) {
            let tree = SendMerkleTree::new((0..size).map(item).collect());
            let leaf = leaf_seed % size;
            let proof = tree.proof(size, leaf).unwrap();
            prop_assert!(proof.verify(item(leaf), tree.root(size)));
        }
    }
}
