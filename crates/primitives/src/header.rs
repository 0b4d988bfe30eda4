//! Accumulator data carried in child chain block headers.

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};

/// The send accumulator state committed to by a child chain block.
///
/// The send root lives in `extra_data`. The first eight bytes of `mix_hash` hold the send count
/// and the next eight the parent chain block number, both big endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbHeaderInfo {
    /// The root of the send accumulator after this block.
    pub send_root: B256,
    /// The number of child-to-parent messages sent up to and including this block.
    pub send_count: u64,
    /// The parent chain block number this block was derived from.
    pub l1_block_number: u64,
}

impl ArbHeaderInfo {
    /// Reads the accumulator fields from `header`. Returns `None` if `extra_data` is not a
    /// 32 byte send root.
    pub fn from_header(header: &Header) -> Option<Self> {
        if header.extra_data.len() != 32 {
            return None;
        }
        let mix = header.mix_hash.as_slice();
        let mut send_count = [0u8; 8];
        send_count.copy_from_slice(&mix[..8]);
        let mut l1_block_number = [0u8; 8];
        l1_block_number.copy_from_slice(&mix[8..16]);
        Some(Self {
            send_root: B256::from_slice(&header.extra_data),
            send_count: u64::from_be_bytes(send_count),
            l1_block_number: u64::from_be_bytes(l1_block_number),
        })
    }

    /// Writes the accumulator fields into `header`.
    pub fn apply(&self, header: &mut Header) {
        let mut mix = B256::ZERO;
        mix[..8].copy_from_slice(&self.send_count.to_be_bytes());
        mix[8..16].copy_from_slice(&self.l1_block_number.to_be_bytes());
        header.mix_hash = mix;
        header.extra_data = Bytes::copy_from_slice(self.send_root.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_info_written_and_read_back() {
        let info = ArbHeaderInfo {
            send_root: B256::repeat_byte(0x42),
            send_count: 9,
            l1_block_number: 77,
        };
        let mut header = Header::default();
        info.apply(&mut header);
        assert_eq!(ArbHeaderInfo::from_header(&header), Some(info));
    }

    #[test]
    fn test_non_arbitrum_header() {
        assert_eq!(ArbHeaderInfo::from_header(&Header::default()), None);
    }
}
