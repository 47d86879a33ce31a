use crate::sentry::types::{
    BlockBodiesMessage, BlockHeaders, GetBlockBodies, GetBlockHeaders, GetReceipts, NewBlock,
    NewBlockHashes, ReceiptsMessage,
};
use bytes::Bytes;
use std::convert::TryFrom;

/// The eight eth/66 message kinds the router understands. Numeric values
/// follow the eth/66 wire protocol, not `ethereum_interfaces::sentry`'s own
/// numbering (that crate reuses eth/65-era ids plus a few we don't carry,
/// e.g. `Status`/`Transactions`/pooled-tx gossip — out of scope here per
/// spec.md §1, so this enum is deliberately the subset the router routes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MessageId {
    NewBlockHashes66,
    BlockHeaders66,
    NewBlock66,
    BlockBodies66,
    GetBlockHeaders66,
    GetBlockBodies66,
    Receipts66,
    GetReceipts66,
}

#[derive(Debug, thiserror::Error)]
#[error("unimplemented message id: {0}")]
pub struct UnimplementedMessageId(pub i32);

impl From<MessageId> for ethereum_interfaces::sentry::MessageId {
    fn from(id: MessageId) -> Self {
        use ethereum_interfaces::sentry::MessageId as Wire;
        match id {
            MessageId::NewBlockHashes66 => Wire::NewBlockHashes66,
            MessageId::BlockHeaders66 => Wire::BlockHeaders66,
            MessageId::NewBlock66 => Wire::NewBlock66,
            MessageId::BlockBodies66 => Wire::BlockBodies66,
            MessageId::GetBlockHeaders66 => Wire::GetBlockHeaders66,
            MessageId::GetBlockBodies66 => Wire::GetBlockBodies66,
            MessageId::Receipts66 => Wire::Receipts66,
            MessageId::GetReceipts66 => Wire::GetReceipts66,
        }
    }
}

impl TryFrom<i32> for MessageId {
    type Error = UnimplementedMessageId;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use ethereum_interfaces::sentry::MessageId as Wire;
        let wire =
            Wire::from_i32(value).ok_or(UnimplementedMessageId(value))?;
        Ok(match wire {
            Wire::NewBlockHashes66 => Self::NewBlockHashes66,
            Wire::BlockHeaders66 => Self::BlockHeaders66,
            Wire::NewBlock66 => Self::NewBlock66,
            Wire::BlockBodies66 => Self::BlockBodies66,
            Wire::GetBlockHeaders66 => Self::GetBlockHeaders66,
            Wire::GetBlockBodies66 => Self::GetBlockBodies66,
            Wire::Receipts66 => Self::Receipts66,
            Wire::GetReceipts66 => Self::GetReceipts66,
            _ => return Err(UnimplementedMessageId(value)),
        })
    }
}

/// A still-encoded message as handed to `Dispatcher::handle` by C1.
///
/// `id` is the raw wire tag, not yet validated against the set of known
/// eth/66 ids — that's the dispatcher's first move (spec.md §4.2: "unknown
/// tag -> fails with kind=Unimplemented").
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub peer_id: crate::models::PeerId,
    pub id: i32,
    pub data: Bytes,
}

/// A message about to be sent, not yet wrapped with a peer filter.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub data: Bytes,
}

/// Typed outbound payloads the router actually constructs (as opposed to
/// the opaque `OutboundMessage` bytes it hands to the transport). Kept as
/// a closed enum, mirroring the teacher's `sentry2::types::Message`, so
/// call sites in C3/C5 build one of these and let `OutboundMessage::from`
/// do the RLP encoding exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NewBlockHashes(NewBlockHashes),
    GetBlockHeaders(GetBlockHeaders),
    BlockHeaders(BlockHeaders),
    GetBlockBodies(GetBlockBodies),
    BlockBodies(BlockBodiesMessage),
    NewBlock(Box<NewBlock>),
    GetReceipts(GetReceipts),
    Receipts(ReceiptsMessage),
}

impl Message {
    pub const fn id(&self) -> MessageId {
        match self {
            Self::NewBlockHashes(_) => MessageId::NewBlockHashes66,
            Self::GetBlockHeaders(_) => MessageId::GetBlockHeaders66,
            Self::BlockHeaders(_) => MessageId::BlockHeaders66,
            Self::GetBlockBodies(_) => MessageId::GetBlockBodies66,
            Self::BlockBodies(_) => MessageId::BlockBodies66,
            Self::NewBlock(_) => MessageId::NewBlock66,
            Self::GetReceipts(_) => MessageId::GetReceipts66,
            Self::Receipts(_) => MessageId::Receipts66,
        }
    }
}

impl rlp::Encodable for Message {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        match self {
            Self::NewBlockHashes(v) => rlp::Encodable::rlp_append(v, s),
            Self::GetBlockHeaders(v) => rlp::Encodable::rlp_append(v, s),
            Self::BlockHeaders(v) => rlp::Encodable::rlp_append(v, s),
            Self::GetBlockBodies(v) => rlp::Encodable::rlp_append(v, s),
            Self::BlockBodies(v) => rlp::Encodable::rlp_append(v, s),
            Self::NewBlock(v) => rlp::Encodable::rlp_append(v.as_ref(), s),
            Self::GetReceipts(v) => rlp::Encodable::rlp_append(v, s),
            Self::Receipts(v) => rlp::Encodable::rlp_append(v, s),
        }
    }
}

impl From<Message> for OutboundMessage {
    fn from(message: Message) -> Self {
        let id = message.id();
        let data = Bytes::from(rlp::encode(&message).to_vec());
        Self { id, data }
    }
}
