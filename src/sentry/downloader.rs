use crate::models::{Block, BlockNumber, H256};
use crate::sentry::segment::ChainSegmentHeader;
use crate::sentry::types::{HeaderRequest, Penalty};
use crate::sentry::store::ReadTransaction;
use bytes::Bytes;
use std::time::Instant;

/// Outcome of feeding a batch of headers through `HeaderDownload`.
#[derive(Debug, Clone, Default)]
pub struct ProcessHeadersOutcome {
    /// The downloader has room for another batch; C3 should call
    /// `request_more_headers` and send it.
    pub can_request_more: bool,
    /// Peers to penalize as a side effect of processing this segment
    /// (spec.md §7 taxonomy entry "DownloaderReject").
    pub penalties: Vec<Penalty>,
}

/// The header-download state machine (`HD`), owned exclusively by
/// `MultiClient` and mutated only from `HeaderIngest` (C3) — spec.md §3.
///
/// An external collaborator: its real implementation (anchor/link graph,
/// persistence, stage scheduling) lives outside this crate. This trait is
/// the full operation set spec.md §9 names, nothing more — reimplementors
/// wire it in as a dependency, not a base class.
pub trait HeaderDownload: Send + Sync {
    /// Records that a peer announced this hash, regardless of whether we
    /// already have it.
    fn save_external_announce(&self, hash: H256);

    /// Whether the downloader already has a link (graph node) for this
    /// hash — an announce for a known hash needs no header request.
    fn has_link(&self, hash: H256) -> bool;

    /// Feeds one sorted segment into the state machine.
    fn process_headers(
        &self,
        segment: Vec<ChainSegmentHeader>,
        new_block: bool,
        peer_id: crate::models::PeerId,
    ) -> anyhow::Result<ProcessHeadersOutcome>;

    /// POS variant: headers arrive descending-sorted and consensus-layer
    /// driven, so processing happens against a read-only store transaction
    /// instead of the PoW anchor/link graph.
    fn process_headers_pos(
        &self,
        segment: Vec<ChainSegmentHeader>,
        tx: &dyn ReadTransaction,
        peer_id: crate::models::PeerId,
    ) -> anyhow::Result<Vec<Penalty>>;

    /// Wraps a single `NewBlock` header as a one-element segment, applying
    /// PoS-era sanity checks (`penalize_pos`). `Err` carries the penalties
    /// to issue instead of a segment.
    fn single_header_as_segment(
        &self,
        header_raw: Bytes,
        header: crate::models::BlockHeader,
        penalize_pos: bool,
    ) -> Result<ChainSegmentHeader, Vec<Penalty>>;

    /// Computes the next header request to send, if the downloader wants
    /// more at time `now`. Returns the request plus how many peers it
    /// should be multicast to when multi-peer requests are enabled — the
    /// downloader's current peer-selection count (spec.md §4.7).
    fn request_more_headers(&self, now: Instant) -> Option<(HeaderRequest, u64)>;

    fn update_stats(&self, headers_count: usize, new_block: bool);

    /// Resets the retry timer for the in-flight request to `now + interval`.
    fn update_retry_time(&self, retry_time: Instant);

    /// True while the downloader hasn't completed its first full sync
    /// cycle.
    fn initial_cycle(&self) -> bool;

    /// True once the initial cycle is fetching new (head-adjacent) headers
    /// rather than backfilling history.
    fn fetching_new(&self) -> bool;

    /// True once header ingestion is consensus-layer (PoS) driven.
    fn pos_sync(&self) -> bool;

    /// The first block height observed under PoS rules, if any — used to
    /// gate `NewBlock` propagation post-TTD (spec.md §4.3, §9 open
    /// question: a `None` here means propagation is never suppressed, even
    /// post-TTD, by design).
    fn first_pos_height(&self) -> Option<BlockNumber>;
}

/// The body-download request queue (`BD`), mutated from `BodyIngest` (C4)
/// and the `NewBlock` path of `HeaderIngest` (C3) — spec.md §3.
pub trait BodyDownload: Send + Sync {
    /// Pre-caches a just-announced block's body so a later `GetBlockBodies`
    /// round-trip isn't needed for it.
    fn add_to_prefetch(&self, block: Block);

    /// Delivers a decoded `BlockBodies66` payload. `total_size` is the
    /// encoded payload size, used by the downloader to pace requests.
    fn deliver_bodies(
        &self,
        bodies: Vec<crate::models::BlockBody>,
        total_size: usize,
        peer_id: crate::models::PeerId,
    );
}
