use crate::models::{Address, BlockHeader, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// An opaque, still-encoded transaction.
///
/// Transaction semantics (legacy vs. EIP-2718 typed, signature recovery,
/// pool admission) belong to the transaction pool, which is explicitly out
/// of scope here — the router only ever forwards transaction bytes on to
/// the body-download engine, so there is nothing to gain from parsing them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction(pub Vec<u8>);

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append_raw(&self.0, 1);
    }
}

impl Decodable for Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self(rlp.as_raw().to_vec()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Withdrawal {
    pub index: u64,
    pub validator_index: u64,
    pub address: Address,
    pub amount: U256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    pub ommers: Vec<BlockHeader>,
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl BlockBody {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.ommers.is_empty()
            && self.withdrawals.as_ref().map_or(true, Vec::is_empty)
    }
}

impl Encodable for BlockBody {
    fn rlp_append(&self, s: &mut RlpStream) {
        let field_count = 2 + self.withdrawals.is_some() as usize;
        s.begin_list(field_count);
        s.append_list(&self.transactions);
        s.append_list(&self.ommers);
        if let Some(withdrawals) = &self.withdrawals {
            s.append_list(withdrawals);
        }
    }
}

impl Decodable for BlockBody {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let field_count = rlp.item_count()?;
        if field_count < 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            transactions: rlp.list_at(0)?,
            ommers: rlp.list_at(1)?,
            withdrawals: if field_count > 2 {
                Some(rlp.list_at(2)?)
            } else {
                None
            },
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Encodable for Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        let field_count = 3 + self.body.withdrawals.is_some() as usize;
        s.begin_list(field_count);
        s.append(&self.header);
        s.append_list(&self.body.transactions);
        s.append_list(&self.body.ommers);
        if let Some(withdrawals) = &self.body.withdrawals {
            s.append_list(withdrawals);
        }
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let field_count = rlp.item_count()?;
        if field_count < 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            header: rlp.val_at(0)?,
            body: BlockBody {
                transactions: rlp.list_at(1)?,
                ommers: rlp.list_at(2)?,
                withdrawals: if field_count > 3 {
                    Some(rlp.list_at(3)?)
                } else {
                    None
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockNumber;

    #[test]
    fn block_round_trips_without_withdrawals() {
        let block = Block {
            header: BlockHeader {
                number: BlockNumber(1),
                ..Default::default()
            },
            body: BlockBody {
                transactions: vec![Transaction(vec![0x01, 0x02])],
                ommers: vec![],
                withdrawals: None,
            },
        };
        let encoded = rlp::encode(&block);
        let decoded: Block = rlp::decode(&encoded).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn empty_body_reports_empty() {
        assert!(BlockBody::default().is_empty());
    }
}
