use crate::models::{BlockBody, H256};
use rlp_derive::{RlpDecodable, RlpEncodable};

#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct GetBlockBodies {
    pub request_id: u64,
    pub hashes: Vec<H256>,
}

impl GetBlockBodies {
    pub fn new(request_id: u64, hashes: Vec<H256>) -> Self {
        Self {
            request_id,
            hashes,
        }
    }
}

/// Named `*Message` to avoid colliding with `models::BlockBody`, the single
/// body this message carries many of.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockBodiesMessage {
    pub request_id: u64,
    pub bodies: Vec<BlockBody>,
}

impl BlockBodiesMessage {
    pub fn new(request_id: u64, bodies: Vec<BlockBody>) -> Self {
        Self {
            request_id,
            bodies,
        }
    }
}
