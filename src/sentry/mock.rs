//! In-memory fakes for the external collaborators (spec.md §3's "interfaces
//! only" framing), used by this crate's own tests and available to anyone
//! embedding `multisentry` who wants to test their own wiring.
#![cfg(test)]

use crate::models::{Block, BlockBody, BlockHeader, BlockNumber, PeerId, H256};
use crate::sentry::downloader::{BodyDownload, HeaderDownload, ProcessHeadersOutcome};
use crate::sentry::handle::SentryHandle;
use crate::sentry::peer::{PeerEvent, PeerInfo};
use crate::sentry::segment::ChainSegmentHeader;
use crate::sentry::store::{ChainStore, ReadTransaction, ReceiptsGetter, StatusMessage, StatusProvider};
use crate::sentry::types::{HeaderRequest, InboundMessage, MessageId, OutboundMessage, Penalty, Receipt};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Records every outbound call instead of talking to a real sentry process.
#[derive(Debug)]
pub struct MockSentryHandle {
    id: usize,
    ready: AtomicBool,
    pub sent_by_id: Mutex<Vec<(PeerId, OutboundMessage)>>,
    pub broadcasts: Mutex<Vec<OutboundMessage>>,
    /// `max_peers` argument of each `send_message_to_random_peers` call,
    /// alongside the message — lets tests assert on the
    /// `maxBlockBroadcastPeers` policy's output (spec.md §3) without
    /// duplicating `broadcasts`.
    pub random_peer_calls: Mutex<Vec<(u64, OutboundMessage)>>,
    pub penalties: Mutex<Vec<PeerId>>,
    pub peer_min_blocks: Mutex<Vec<(PeerId, u64)>>,
}

impl MockSentryHandle {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ready: AtomicBool::new(true),
            sent_by_id: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            random_peer_calls: Mutex::new(Vec::new()),
            penalties: Mutex::new(Vec::new()),
            peer_min_blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

#[async_trait]
impl SentryHandle for MockSentryHandle {
    fn id(&self) -> usize {
        self.id
    }

    async fn handshake(&self, _status: StatusMessage) -> anyhow::Result<()> {
        Ok(())
    }

    async fn messages(&self, _ids: Vec<MessageId>) -> anyhow::Result<BoxStream<'static, anyhow::Result<InboundMessage>>> {
        Ok(stream::empty().boxed())
    }

    async fn peer_events(&self) -> anyhow::Result<BoxStream<'static, anyhow::Result<PeerEvent>>> {
        Ok(stream::empty().boxed())
    }

    async fn send_message_by_id(&self, peer_id: PeerId, message: OutboundMessage) -> anyhow::Result<()> {
        self.sent_by_id.lock().push((peer_id, message));
        Ok(())
    }

    async fn send_message_to_random_peers(&self, max_peers: u64, message: OutboundMessage) -> anyhow::Result<u64> {
        self.random_peer_calls.lock().push((max_peers, message.clone()));
        self.broadcasts.lock().push(message);
        Ok(1)
    }

    async fn send_message_to_all(&self, message: OutboundMessage) -> anyhow::Result<()> {
        self.broadcasts.lock().push(message);
        Ok(())
    }

    async fn penalize_peer(&self, peer_id: PeerId, _kind: crate::sentry::types::PenaltyKind) -> anyhow::Result<()> {
        self.penalties.lock().push(peer_id);
        Ok(())
    }

    async fn peer_min_block(&self, peer_id: PeerId, min_block: u64) -> anyhow::Result<()> {
        self.peer_min_blocks.lock().push((peer_id, min_block));
        Ok(())
    }

    async fn peer_by_id(&self, _peer_id: PeerId) -> anyhow::Result<Option<PeerInfo>> {
        Ok(None)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// In-memory stand-in for the header-download state machine. Good enough
/// to exercise `HeaderIngest`'s control flow without a real anchor/link
/// graph: always accepts headers, never asks for more, never penalizes,
/// unless a test overrides its fields directly.
#[derive(Debug)]
pub struct MockHeaderDownload {
    pub links: Mutex<std::collections::HashSet<H256>>,
    pub processed: Mutex<Vec<ChainSegmentHeader>>,
    pub outcome: Mutex<ProcessHeadersOutcome>,
    pub single_header_result: Mutex<Option<Result<(), Vec<Penalty>>>>,
    pub pos_sync: AtomicBool,
    pub initial_cycle: AtomicBool,
    pub fetching_new: AtomicBool,
    pub first_pos_height: Mutex<Option<BlockNumber>>,
}

impl Default for MockHeaderDownload {
    fn default() -> Self {
        Self {
            links: Mutex::new(Default::default()),
            processed: Mutex::new(Vec::new()),
            outcome: Mutex::new(ProcessHeadersOutcome::default()),
            single_header_result: Mutex::new(None),
            pos_sync: AtomicBool::new(false),
            initial_cycle: AtomicBool::new(false),
            fetching_new: AtomicBool::new(true),
            first_pos_height: Mutex::new(None),
        }
    }
}

impl HeaderDownload for MockHeaderDownload {
    fn save_external_announce(&self, _hash: H256) {}

    fn has_link(&self, hash: H256) -> bool {
        self.links.lock().contains(&hash)
    }

    fn process_headers(
        &self,
        segment: Vec<ChainSegmentHeader>,
        _new_block: bool,
        _peer_id: PeerId,
    ) -> anyhow::Result<ProcessHeadersOutcome> {
        self.processed.lock().extend(segment);
        Ok(self.outcome.lock().clone())
    }

    fn process_headers_pos(
        &self,
        segment: Vec<ChainSegmentHeader>,
        _tx: &dyn ReadTransaction,
        _peer_id: PeerId,
    ) -> anyhow::Result<Vec<Penalty>> {
        self.processed.lock().extend(segment);
        Ok(self.outcome.lock().penalties.clone())
    }

    fn single_header_as_segment(
        &self,
        header_raw: Bytes,
        header: BlockHeader,
        _penalize_pos: bool,
    ) -> Result<ChainSegmentHeader, Vec<Penalty>> {
        match self.single_header_result.lock().clone() {
            Some(Err(penalties)) => Err(penalties),
            _ => Ok(ChainSegmentHeader::new(header, header_raw)),
        }
    }

    fn request_more_headers(&self, _now: Instant) -> Option<(HeaderRequest, u64)> {
        None
    }

    fn update_stats(&self, _headers_count: usize, _new_block: bool) {}

    fn update_retry_time(&self, _retry_time: Instant) {}

    fn initial_cycle(&self) -> bool {
        self.initial_cycle.load(Ordering::Relaxed)
    }

    fn fetching_new(&self) -> bool {
        self.fetching_new.load(Ordering::Relaxed)
    }

    fn pos_sync(&self) -> bool {
        self.pos_sync.load(Ordering::Relaxed)
    }

    fn first_pos_height(&self) -> Option<BlockNumber> {
        *self.first_pos_height.lock()
    }
}

#[derive(Debug, Default)]
pub struct MockBodyDownload {
    pub prefetched: Mutex<Vec<Block>>,
    pub delivered: Mutex<Vec<(Vec<BlockBody>, usize, PeerId)>>,
}

impl BodyDownload for MockBodyDownload {
    fn add_to_prefetch(&self, block: Block) {
        self.prefetched.lock().push(block);
    }

    fn deliver_bodies(&self, bodies: Vec<BlockBody>, total_size: usize, peer_id: PeerId) {
        self.delivered.lock().push((bodies, total_size, peer_id));
    }
}

struct MockReadTransaction;

impl ReadTransaction for MockReadTransaction {
    fn rollback(self: Box<Self>) {}
}

/// Trivial store: headers/bodies are looked up by a hash you pre-seeded;
/// anything else comes back empty, matching what an unsynced node would
/// honestly report rather than erroring.
#[derive(Debug, Default)]
pub struct MockChainStore {
    pub headers: Mutex<Vec<BlockHeader>>,
    pub bodies: Mutex<std::collections::HashMap<H256, BlockBody>>,
}

impl ChainStore for MockChainStore {
    fn begin_ro(&self) -> anyhow::Result<Box<dyn ReadTransaction>> {
        Ok(Box::new(MockReadTransaction))
    }

    fn get_block_headers(
        &self,
        _tx: &dyn ReadTransaction,
        _start: crate::sentry::types::BlockId,
        amount: u64,
        _skip: u64,
        _reverse: bool,
    ) -> anyhow::Result<Vec<BlockHeader>> {
        let headers = self.headers.lock();
        Ok(headers.iter().take(amount as usize).cloned().collect())
    }

    fn get_block_bodies(
        &self,
        _tx: &dyn ReadTransaction,
        hashes: &[H256],
    ) -> anyhow::Result<Vec<Option<BlockBody>>> {
        let bodies = self.bodies.lock();
        Ok(hashes.iter().map(|h| bodies.get(h).cloned()).collect())
    }
}

#[derive(Debug, Default)]
pub struct MockReceiptsGetter {
    pub cached: Mutex<std::collections::HashMap<H256, Vec<Receipt>>>,
}

impl ReceiptsGetter for MockReceiptsGetter {
    fn get_cached(&self, hashes: &[H256]) -> Vec<Option<Vec<Receipt>>> {
        let cached = self.cached.lock();
        hashes.iter().map(|h| cached.get(h).cloned()).collect()
    }

    fn get(&self, _tx: &dyn ReadTransaction, hashes: &[H256]) -> anyhow::Result<Vec<Option<Vec<Receipt>>>> {
        Ok(hashes.iter().map(|_| None).collect())
    }
}

pub struct MockStatusProvider(pub StatusMessage);

impl StatusProvider for MockStatusProvider {
    fn status(&self) -> StatusMessage {
        self.0.clone()
    }
}

pub fn shared_sentry(id: usize) -> Arc<MockSentryHandle> {
    Arc::new(MockSentryHandle::new(id))
}
