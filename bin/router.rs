use clap::Parser;
use multisentry::binutil::RouterDataDir;
use multisentry::chain::ChainConfig;
use multisentry::models::{BlockBody, BlockHeader, PeerId, H256, U256};
use multisentry::sentry::downloader::{BodyDownload, HeaderDownload, ProcessHeadersOutcome};
use multisentry::sentry::handle::{GrpcSentryHandle, SharedSentryHandle};
use multisentry::sentry::segment::ChainSegmentHeader;
use multisentry::sentry::store::{
    BlockReader, ChainStore, ConsensusEngine, ReadTransaction, ReceiptsGetter, StatusMessage,
    StatusProvider,
};
use multisentry::sentry::types::{BlockId, HeaderRequest, Penalty, Receipt};
use multisentry::sentry::{MultiClient, MultiClientConfig};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[clap(name = "multisentry", about = "Multi-sentry p2p message router for an Ethereum execution node")]
pub struct Opt {
    #[clap(long, env)]
    pub datadir: Option<RouterDataDir>,

    /// `host:port` of each sentry process's gRPC endpoint. Repeatable.
    #[clap(long, env, required = true)]
    pub sentry_addr: Vec<String>,

    #[clap(long, env, default_value = "1")]
    pub network_id: u64,

    #[clap(long, env)]
    pub terminal_total_difficulty: Option<String>,

    /// Set when the node is starting already past TTD (a resumed PoS chain)
    /// so header requests multicast to several peers from the first
    /// reconnect rather than waiting to observe a live crossing.
    #[clap(long, env)]
    pub terminal_total_difficulty_passed: bool,

    #[clap(long, env)]
    pub disable_block_download: bool,

    #[clap(long, env)]
    pub log_peer_info: bool,
}

/// Status this node reports to every sentry before subscribing. A real
/// node refreshes this from its own head as it syncs; this binary reports
/// a fixed genesis-only status, since chain-state tracking is an external
/// collaborator's job here (spec.md §3).
struct StaticStatusProvider(StatusMessage);

impl StatusProvider for StaticStatusProvider {
    fn status(&self) -> StatusMessage {
        self.0.clone()
    }
}

struct NullTransaction;

impl ReadTransaction for NullTransaction {
    fn rollback(self: Box<Self>) {}
}

/// Placeholder chain store answering every query with "don't have it" —
/// stands in for the real store until one is wired in by an embedder
/// (persistent storage is a non-goal of this crate, spec.md §1).
struct EmptyChainStore;

impl ChainStore for EmptyChainStore {
    fn begin_ro(&self) -> anyhow::Result<Box<dyn ReadTransaction>> {
        Ok(Box::new(NullTransaction))
    }

    fn get_block_headers(
        &self,
        _tx: &dyn ReadTransaction,
        _start: BlockId,
        _amount: u64,
        _skip: u64,
        _reverse: bool,
    ) -> anyhow::Result<Vec<BlockHeader>> {
        Ok(vec![])
    }

    fn get_block_bodies(
        &self,
        _tx: &dyn ReadTransaction,
        hashes: &[H256],
    ) -> anyhow::Result<Vec<Option<BlockBody>>> {
        Ok(vec![None; hashes.len()])
    }
}

impl BlockReader for EmptyChainStore {
    fn canonical_hash(&self, _number: multisentry::models::BlockNumber) -> anyhow::Result<Option<H256>> {
        Ok(None)
    }
}

/// Placeholder consensus engine accepting every header — stands in until an
/// embedder wires in real header verification (block execution and
/// consensus proper are non-goals of this crate, spec.md §1/§3).
struct NoopConsensusEngine;

impl ConsensusEngine for NoopConsensusEngine {
    fn verify_header(&self, _header: &BlockHeader) -> anyhow::Result<()> {
        Ok(())
    }
}

struct EmptyReceiptsGetter;

impl ReceiptsGetter for EmptyReceiptsGetter {
    fn get_cached(&self, hashes: &[H256]) -> Vec<Option<Vec<Receipt>>> {
        vec![None; hashes.len()]
    }

    fn get(&self, _tx: &dyn ReadTransaction, hashes: &[H256]) -> anyhow::Result<Vec<Option<Vec<Receipt>>>> {
        Ok(vec![None; hashes.len()])
    }
}

/// No-op header/body download state machines — every handler call becomes
/// an accepted, terminal no-op. A real downloader (anchor/link graph,
/// persistence, stage scheduling) is an external collaborator this binary
/// doesn't provide on its own (spec.md §3, §9).
struct NoopHeaderDownload;

impl HeaderDownload for NoopHeaderDownload {
    fn save_external_announce(&self, _hash: H256) {}

    fn has_link(&self, _hash: H256) -> bool {
        false
    }

    fn process_headers(
        &self,
        _segment: Vec<ChainSegmentHeader>,
        _new_block: bool,
        _peer_id: PeerId,
    ) -> anyhow::Result<ProcessHeadersOutcome> {
        Ok(ProcessHeadersOutcome::default())
    }

    fn process_headers_pos(
        &self,
        _segment: Vec<ChainSegmentHeader>,
        _tx: &dyn ReadTransaction,
        _peer_id: PeerId,
    ) -> anyhow::Result<Vec<Penalty>> {
        Ok(vec![])
    }

    fn single_header_as_segment(
        &self,
        header_raw: bytes::Bytes,
        header: BlockHeader,
        _penalize_pos: bool,
    ) -> Result<ChainSegmentHeader, Vec<Penalty>> {
        Ok(ChainSegmentHeader::new(header, header_raw))
    }

    fn request_more_headers(&self, _now: std::time::Instant) -> Option<(HeaderRequest, u64)> {
        None
    }

    fn update_stats(&self, _headers_count: usize, _new_block: bool) {}

    fn update_retry_time(&self, _retry_time: std::time::Instant) {}

    fn initial_cycle(&self) -> bool {
        false
    }

    fn fetching_new(&self) -> bool {
        true
    }

    fn pos_sync(&self) -> bool {
        false
    }

    fn first_pos_height(&self) -> Option<multisentry::models::BlockNumber> {
        None
    }
}

struct NoopBodyDownload;

impl BodyDownload for NoopBodyDownload {
    fn add_to_prefetch(&self, _block: multisentry::models::Block) {}

    fn deliver_bodies(&self, _bodies: Vec<BlockBody>, _total_size: usize, _peer_id: PeerId) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let env_filter = if std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default().is_empty() {
        EnvFilter::new("multisentry=info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    let terminal_total_difficulty = opt
        .terminal_total_difficulty
        .as_deref()
        .map(U256::from_dec_str)
        .transpose()?;
    let chain_config = ChainConfig::with_ttd_passed(
        opt.network_id,
        terminal_total_difficulty,
        opt.terminal_total_difficulty_passed,
    );

    if let Some(datadir) = &opt.datadir {
        tracing::debug!(%datadir, "resolved data directory");
    }

    let mut sentries: Vec<SharedSentryHandle> = Vec::with_capacity(opt.sentry_addr.len());
    for (id, addr) in opt.sentry_addr.iter().enumerate() {
        let handle = GrpcSentryHandle::connect(id, addr.clone()).await?;
        sentries.push(Arc::new(handle));
    }

    let status = StatusMessage {
        network_id: opt.network_id,
        total_difficulty: U256::zero(),
        best_hash: H256::zero(),
        genesis_hash: H256::zero(),
    };

    let client = MultiClient::new(MultiClientConfig {
        sentries,
        header_download: Arc::new(NoopHeaderDownload),
        body_download: Arc::new(NoopBodyDownload),
        store: Arc::new(EmptyChainStore),
        receipts: Arc::new(EmptyReceiptsGetter),
        consensus: Arc::new(NoopConsensusEngine),
        block_reader: Arc::new(EmptyChainStore),
        status: Arc::new(StaticStatusProvider(status)),
        chain_config,
        disable_block_download: opt.disable_block_download,
        log_peer_info: opt.log_peer_info,
        is_mock: false,
        max_block_broadcast_peers: None,
    });

    let (shutdown, handles) = client.run();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    let _ = shutdown.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
