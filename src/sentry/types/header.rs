use crate::models::{BlockNumber, H256};
use educe::Educe;

/// A request for one or more headers, addressed either by hash or by number.
/// `rand::random()` supplies the eth/66 `requestId` at the send site (C3/C7),
/// not here — this type only carries the query shape.
#[derive(Educe)]
#[educe(Default)]
pub struct HeaderRequest {
    pub hash: H256,
    pub number: BlockNumber,
    #[educe(Default = 192)]
    pub limit: u64,
    pub skip: Option<u64>,
    pub reverse: bool,
}

impl HeaderRequest {
    pub fn new(
        hash: H256,
        number: BlockNumber,
        limit: u64,
        skip: Option<u64>,
        reverse: bool,
    ) -> Self {
        Self {
            hash,
            number,
            limit,
            skip,
            reverse,
        }
    }
}

pub struct Announce {
    pub hash: H256,
    pub number: BlockNumber,
}

impl Announce {
    pub fn new(hash: H256, number: BlockNumber) -> Self {
        Self { hash, number }
    }
}
