use crate::models::H256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// A still-encoded receipt (legacy or EIP-2718 typed).
///
/// Receipt construction is `ReceiptsGetter`'s job (an external collaborator,
/// spec.md §1/§3) — the router only ever re-serves bytes it was handed, the
/// same passthrough treatment as `Transaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt(pub Vec<u8>);

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append_raw(&self.0, 1);
    }
}

impl Decodable for Receipt {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self(rlp.as_raw().to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct GetReceipts {
    pub request_id: u64,
    pub hashes: Vec<H256>,
}

impl GetReceipts {
    pub fn new(request_id: u64, hashes: Vec<H256>) -> Self {
        Self {
            request_id,
            hashes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct ReceiptsMessage {
    pub request_id: u64,
    pub receipts: Vec<Vec<Receipt>>,
}

impl ReceiptsMessage {
    pub fn new(request_id: u64, receipts: Vec<Vec<Receipt>>) -> Self {
        Self {
            request_id,
            receipts,
        }
    }
}
