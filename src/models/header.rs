use crate::models::{keccak256, Address, BlockNumber, Bloom, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// A block header. Fields after `nonce` were added by later forks and are
/// only present on the wire when the block postdates that fork, so encoding
/// and decoding are hand-rolled rather than derived — `rlp-derive` has no
/// notion of "trailing optional field".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_hash: H256,
    pub ommers_hash: H256,
    pub beneficiary: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: BlockNumber,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    pub mix_hash: H256,
    pub nonce: [u8; 8],
    pub base_fee_per_gas: Option<U256>,
    pub withdrawals_root: Option<H256>,
}

impl BlockHeader {
    /// Canonical block hash: Keccak-256 of this header's own RLP encoding.
    ///
    /// Callers that already hold the header's raw wire bytes (the normal
    /// case in the ingestion path, see `ChainSegmentHeader`) should hash
    /// those bytes directly instead of calling this — re-encoding is not
    /// guaranteed to round-trip byte-for-byte for headers this node didn't
    /// produce itself.
    pub fn hash(&self) -> H256 {
        keccak256(rlp::encode(self))
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        let field_count = 15 + self.base_fee_per_gas.is_some() as usize
            + self.withdrawals_root.is_some() as usize;
        s.begin_list(field_count);
        s.append(&self.parent_hash);
        s.append(&self.ommers_hash);
        s.append(&self.beneficiary);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data);
        s.append(&self.mix_hash);
        s.append(&self.nonce.as_ref());
        if let Some(base_fee) = &self.base_fee_per_gas {
            s.append(base_fee);
        }
        if let Some(withdrawals_root) = &self.withdrawals_root {
            s.append(withdrawals_root);
        }
    }
}

impl Decodable for BlockHeader {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let field_count = rlp.item_count()?;
        if field_count < 15 {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        let nonce_bytes: Vec<u8> = rlp.val_at(14)?;
        let nonce: [u8; 8] = nonce_bytes
            .try_into()
            .map_err(|_| DecoderError::RlpInvalidLength)?;

        let base_fee_per_gas = if field_count > 15 {
            Some(rlp.val_at(15)?)
        } else {
            None
        };
        let withdrawals_root = if field_count > 16 {
            Some(rlp.val_at(16)?)
        } else {
            None
        };

        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            ommers_hash: rlp.val_at(1)?,
            beneficiary: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at(12)?,
            mix_hash: rlp.val_at(13)?,
            nonce,
            base_fee_per_gas,
            withdrawals_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_encoding_round_trips() {
        let header = BlockHeader {
            number: BlockNumber(42),
            gas_limit: 30_000_000,
            extra_data: b"multisentry".to_vec(),
            base_fee_per_gas: Some(U256::from(7u64)),
            ..Default::default()
        };

        let encoded = rlp::encode(&header);
        let decoded: BlockHeader = rlp::decode(&encoded).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(header.hash(), decoded.hash());
    }

    #[test]
    fn pre_london_header_has_no_base_fee_field() {
        let header = BlockHeader {
            number: BlockNumber(1),
            ..Default::default()
        };
        let encoded = rlp::encode(&header);
        let rlp = Rlp::new(&encoded);
        assert_eq!(rlp.item_count().unwrap(), 15);
    }
}
