use crate::models::{keccak256, BlockHeader, BlockNumber, H256};
use bytes::Bytes;

/// One header plus the exact bytes it was decoded from.
///
/// `hash` is always `keccak256(header_raw)`, never a re-encode of `header` —
/// see spec.md §3 invariant on raw-bytes preservation and §9's note on why:
/// a header this node didn't produce may not round-trip byte-identically
/// through our own RLP encoder (e.g. a peer that encodes a zero as `0x80`
/// vs. an empty string, or carries unexpected trailing fields we decode but
/// don't re-emit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegmentHeader {
    pub header: BlockHeader,
    pub header_raw: Bytes,
    pub hash: H256,
    pub number: BlockNumber,
}

impl ChainSegmentHeader {
    pub fn new(header: BlockHeader, header_raw: Bytes) -> Self {
        let hash = keccak256(&header_raw);
        let number = header.number;
        Self {
            header,
            header_raw,
            hash,
            number,
        }
    }
}

/// A non-empty, ordered run of headers handed to the downloader as a unit.
#[derive(Debug, Clone)]
pub struct ChainSegment(Vec<ChainSegmentHeader>);

impl ChainSegment {
    /// Returns `None` for an empty input — a segment is non-empty by
    /// definition (spec.md §3).
    pub fn new(headers: Vec<ChainSegmentHeader>) -> Option<Self> {
        if headers.is_empty() {
            None
        } else {
            Some(Self(headers))
        }
    }

    pub fn headers(&self) -> &[ChainSegmentHeader] {
        &self.0
    }

    pub fn into_headers(self) -> Vec<ChainSegmentHeader> {
        self.0
    }

    pub fn sort_ascending(&mut self) {
        self.0.sort_by_key(|h| h.number);
    }

    pub fn sort_descending(&mut self) {
        self.0.sort_by_key(|h| std::cmp::Reverse(h.number));
    }

    pub fn max_number(&self) -> BlockNumber {
        self.0.iter().map(|h| h.number).max().unwrap_or_default()
    }

    pub fn is_sorted_ascending(&self) -> bool {
        self.0.windows(2).all(|w| w[0].number < w[1].number)
    }

    pub fn is_sorted_descending(&self) -> bool {
        self.0.windows(2).all(|w| w[0].number > w[1].number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockHeader;

    fn header_with_number(number: u64) -> ChainSegmentHeader {
        let header = BlockHeader {
            number: BlockNumber(number),
            ..Default::default()
        };
        let raw = Bytes::from(rlp::encode(&header).to_vec());
        ChainSegmentHeader::new(header, raw)
    }

    #[test]
    fn hash_matches_keccak_of_raw_bytes_not_reencode() {
        let mut header = header_with_number(1);
        // Corrupt the stored header without touching header_raw: hash must
        // still reflect header_raw, proving no re-encode happens.
        header.header.gas_limit = 999;
        assert_eq!(header.hash, keccak256(&header.header_raw));
    }

    #[test]
    fn sorts_ascending_and_descending() {
        let mut segment =
            ChainSegment::new(vec![header_with_number(3), header_with_number(1), header_with_number(2)])
                .unwrap();
        segment.sort_ascending();
        assert!(segment.is_sorted_ascending());
        segment.sort_descending();
        assert!(segment.is_sorted_descending());
    }

    #[test]
    fn empty_segment_rejected() {
        assert!(ChainSegment::new(vec![]).is_none());
    }
}
