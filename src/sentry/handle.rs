use crate::models::PeerId;
use crate::sentry::peer::PeerEvent;
use crate::sentry::store::StatusMessage;
use crate::sentry::types::{InboundMessage, MessageId, OutboundMessage, PenaltyKind};
use async_trait::async_trait;
use ethereum_interfaces::sentry as grpc_sentry;
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};
use std::{fmt, sync::Arc};
use tonic::transport::Channel;

/// A sentry, abstracted to exactly the RPC surface spec.md §6 lists —
/// "opaque clients" per §3's data model. `MultiClient` holds a
/// `Vec<Arc<dyn SentryHandle>>` rather than a concrete gRPC type so tests
/// can swap in `mock::MockSentryHandle` without a live sentry process.
#[async_trait]
pub trait SentryHandle: Send + Sync + fmt::Debug {
    /// Stable label for logging and for recognizing "the same sentry" when
    /// fanning a penalty or broadcast out across all of them.
    fn id(&self) -> usize;

    async fn handshake(&self, status: StatusMessage) -> anyhow::Result<()>;

    async fn messages(&self, ids: Vec<MessageId>) -> anyhow::Result<BoxStream<'static, anyhow::Result<InboundMessage>>>;

    async fn peer_events(&self) -> anyhow::Result<BoxStream<'static, anyhow::Result<PeerEvent>>>;

    async fn send_message_by_id(&self, peer_id: PeerId, message: OutboundMessage) -> anyhow::Result<()>;

    /// Returns how many peers the message actually went to.
    async fn send_message_to_random_peers(
        &self,
        max_peers: u64,
        message: OutboundMessage,
    ) -> anyhow::Result<u64>;

    async fn send_message_to_all(&self, message: OutboundMessage) -> anyhow::Result<()>;

    async fn penalize_peer(&self, peer_id: PeerId, kind: PenaltyKind) -> anyhow::Result<()>;

    async fn peer_min_block(&self, peer_id: PeerId, min_block: u64) -> anyhow::Result<()>;

    async fn peer_by_id(&self, peer_id: PeerId) -> anyhow::Result<Option<crate::sentry::peer::PeerInfo>>;

    /// Whether this handle is ready to accept work — an in-process (mock)
    /// sentry may report `false` while warming up; spec.md §4.3's `NewBlock`
    /// penalty broadcast skips any sentry that says so.
    fn is_ready(&self) -> bool {
        true
    }
}

/// `tonic`-backed `SentryHandle`, wrapping the same
/// `ethereum_interfaces::sentry::sentry_client::SentryClient<Channel>` the
/// teacher's `sentry2::coordinator::Coordinator` holds.
pub struct GrpcSentryHandle {
    id: usize,
    client: tokio::sync::Mutex<grpc_sentry::sentry_client::SentryClient<Channel>>,
}

impl fmt::Debug for GrpcSentryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcSentryHandle").field("id", &self.id).finish()
    }
}

impl GrpcSentryHandle {
    pub fn new(id: usize, client: grpc_sentry::sentry_client::SentryClient<Channel>) -> Self {
        Self {
            id,
            client: tokio::sync::Mutex::new(client),
        }
    }

    pub async fn connect(id: usize, addr: String) -> anyhow::Result<Self> {
        let endpoint = Channel::from_shared(addr)?
            .connect_timeout(std::time::Duration::from_secs(600))
            .tcp_keepalive(Some(std::time::Duration::from_secs(30)));
        let channel = endpoint.connect_lazy();
        Ok(Self::new(id, grpc_sentry::sentry_client::SentryClient::new(channel)))
    }
}

#[async_trait]
impl SentryHandle for GrpcSentryHandle {
    fn id(&self) -> usize {
        self.id
    }

    async fn handshake(&self, status: StatusMessage) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client
            .set_status(grpc_sentry::StatusData {
                network_id: status.network_id,
                total_difficulty: Some(u256_to_grpc_h256(status.total_difficulty)),
                best_hash: Some(h256_to_grpc(status.best_hash)),
                fork_data: None,
                max_block_height: 0,
                max_block_time: 0,
            })
            .await?;
        Ok(())
    }

    async fn messages(
        &self,
        ids: Vec<MessageId>,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<InboundMessage>>> {
        let mut client = self.client.lock().await;
        let response = client
            .messages(grpc_sentry::MessagesRequest {
                ids: ids
                    .into_iter()
                    .map(|id| grpc_sentry::MessageId::from(id) as i32)
                    .collect(),
            })
            .await?;
        let stream = response.into_inner().map_err(anyhow::Error::from).map_ok(|m| InboundMessage {
            peer_id: grpc_to_h512(m.peer_id.unwrap_or_default()),
            id: m.id,
            data: m.data.into(),
        });
        Ok(stream.boxed())
    }

    async fn peer_events(
        &self,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<crate::sentry::peer::PeerEvent>>> {
        let mut client = self.client.lock().await;
        let response = client
            .peer_events(grpc_sentry::PeerEventsRequest {})
            .await?;
        let stream = response.into_inner().map_err(anyhow::Error::from).and_then(|e| async move {
            use crate::sentry::peer::{PeerEvent, PeerEventKind};
            let kind = match grpc_sentry::peer_event::PeerEventId::from_i32(e.event_id) {
                Some(grpc_sentry::peer_event::PeerEventId::Connect) => PeerEventKind::Connect,
                _ => PeerEventKind::Disconnect,
            };
            Ok(PeerEvent {
                peer_id: grpc_to_h512(e.peer_id.unwrap_or_default()),
                kind,
            })
        });
        Ok(stream.boxed())
    }

    async fn send_message_by_id(&self, peer_id: PeerId, message: OutboundMessage) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client
            .send_message_by_id(grpc_sentry::SendMessageByIdRequest {
                peer_id: Some(h512_to_grpc(peer_id)),
                data: Some(grpc_sentry::OutboundMessageData {
                    id: grpc_sentry::MessageId::from(message.id) as i32,
                    data: message.data.to_vec(),
                }),
            })
            .await?;
        Ok(())
    }

    async fn send_message_to_random_peers(
        &self,
        max_peers: u64,
        message: OutboundMessage,
    ) -> anyhow::Result<u64> {
        let mut client = self.client.lock().await;
        let reply = client
            .send_message_to_random_peers(grpc_sentry::SendMessageToRandomPeersRequest {
                max_peers,
                data: Some(grpc_sentry::OutboundMessageData {
                    id: grpc_sentry::MessageId::from(message.id) as i32,
                    data: message.data.to_vec(),
                }),
            })
            .await?
            .into_inner();
        Ok(reply.peers.len() as u64)
    }

    async fn send_message_to_all(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client
            .send_message_to_all(grpc_sentry::OutboundMessageData {
                id: grpc_sentry::MessageId::from(message.id) as i32,
                data: message.data.to_vec(),
            })
            .await?;
        Ok(())
    }

    async fn penalize_peer(&self, peer_id: PeerId, _kind: PenaltyKind) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client
            .penalize_peer(grpc_sentry::PenalizePeerRequest {
                peer_id: Some(h512_to_grpc(peer_id)),
                penalty: grpc_sentry::PenaltyKind::Kick as i32,
            })
            .await?;
        Ok(())
    }

    async fn peer_min_block(&self, peer_id: PeerId, min_block: u64) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client
            .peer_min_block(grpc_sentry::PeerMinBlockRequest {
                peer_id: Some(h512_to_grpc(peer_id)),
                min_block,
            })
            .await?;
        Ok(())
    }

    async fn peer_by_id(&self, peer_id: PeerId) -> anyhow::Result<Option<crate::sentry::peer::PeerInfo>> {
        let mut client = self.client.lock().await;
        let reply = client
            .peer_by_id(grpc_sentry::PeerByIdRequest {
                peer_id: Some(h512_to_grpc(peer_id)),
            })
            .await?
            .into_inner();
        Ok(reply.peer.map(|p| crate::sentry::peer::PeerInfo {
            enode_url: Some(p.enode),
            client_id: Some(p.name),
            capabilities: p.caps,
        }))
    }
}

pub type SharedSentryHandle = Arc<dyn SentryHandle>;

/// `ethereum_interfaces::types` encodes 256/512-bit words as nested
/// hi/lo halves rather than raw byte strings. These conversions isolate
/// that detail to the gRPC boundary so the rest of the router only ever
/// deals in `ethereum_types::{H256, H512}`.
fn u256_to_grpc_h256(value: crate::models::U256) -> ethereum_interfaces::types::H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    h256_to_grpc(crate::models::H256::from(bytes))
}

fn h256_to_grpc(value: crate::models::H256) -> ethereum_interfaces::types::H256 {
    let b = value.as_bytes();
    ethereum_interfaces::types::H256 {
        hi: Some(ethereum_interfaces::types::H128 {
            hi: u64::from_be_bytes(b[0..8].try_into().unwrap()),
            lo: u64::from_be_bytes(b[8..16].try_into().unwrap()),
        }),
        lo: Some(ethereum_interfaces::types::H128 {
            hi: u64::from_be_bytes(b[16..24].try_into().unwrap()),
            lo: u64::from_be_bytes(b[24..32].try_into().unwrap()),
        }),
    }
}

fn grpc_to_h256(value: ethereum_interfaces::types::H256) -> crate::models::H256 {
    let mut bytes = [0u8; 32];
    if let Some(hi) = value.hi {
        bytes[0..8].copy_from_slice(&hi.hi.to_be_bytes());
        bytes[8..16].copy_from_slice(&hi.lo.to_be_bytes());
    }
    if let Some(lo) = value.lo {
        bytes[16..24].copy_from_slice(&lo.hi.to_be_bytes());
        bytes[24..32].copy_from_slice(&lo.lo.to_be_bytes());
    }
    crate::models::H256::from(bytes)
}

fn h512_to_grpc(value: PeerId) -> ethereum_interfaces::types::H512 {
    let b = value.as_bytes();
    ethereum_interfaces::types::H512 {
        hi: Some(h256_to_grpc(crate::models::H256::from_slice(&b[0..32]))),
        lo: Some(h256_to_grpc(crate::models::H256::from_slice(&b[32..64]))),
    }
}

fn grpc_to_h512(value: ethereum_interfaces::types::H512) -> PeerId {
    let mut bytes = [0u8; 64];
    if let Some(hi) = value.hi {
        bytes[0..32].copy_from_slice(grpc_to_h256(hi).as_bytes());
    }
    if let Some(lo) = value.lo {
        bytes[32..64].copy_from_slice(grpc_to_h256(lo).as_bytes());
    }
    PeerId::from(bytes)
}
