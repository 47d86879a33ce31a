use crate::sentry::types::{
    BlockBodiesMessage, BlockHeaders, BlockId, GetBlockBodies, GetBlockHeaders, GetReceipts,
    Message, MessageId, NewBlock, NewBlockHashes, ReceiptsMessage,
};

/// Decodes a still-tagged inbound payload into its typed `Message`.
///
/// Used directly by handlers that don't need the raw-bytes capture (C5's
/// query side, C4); the header-ingestion path (C3) instead re-derives its
/// own two-pass decode so it can keep each header's raw RLP slice — see
/// `header_ingest.rs`.
pub fn decode_message(id: MessageId, data: &[u8]) -> Result<Message, rlp::DecoderError> {
    Ok(match id {
        MessageId::NewBlockHashes66 => Message::NewBlockHashes(rlp::decode(data)?),
        MessageId::GetBlockHeaders66 => Message::GetBlockHeaders(rlp::decode(data)?),
        MessageId::BlockHeaders66 => Message::BlockHeaders(rlp::decode(data)?),
        MessageId::GetBlockBodies66 => Message::GetBlockBodies(rlp::decode(data)?),
        MessageId::BlockBodies66 => Message::BlockBodies(rlp::decode::<BlockBodiesMessage>(data)?),
        MessageId::NewBlock66 => Message::NewBlock(Box::new(rlp::decode::<NewBlock>(data)?)),
        MessageId::GetReceipts66 => Message::GetReceipts(rlp::decode(data)?),
        MessageId::Receipts66 => Message::Receipts(rlp::decode::<ReceiptsMessage>(data)?),
    })
}

impl rlp::Decodable for BlockId {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        if rlp.size() == 32 {
            Ok(Self::Hash(rlp.as_val()?))
        } else {
            Ok(Self::Number(rlp.as_val()?))
        }
    }
}

impl rlp::Encodable for BlockId {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        match self {
            Self::Hash(v) => rlp::Encodable::rlp_append(v, s),
            Self::Number(v) => rlp::Encodable::rlp_append(v, s),
        }
    }
}
