use crate::models::{BlockBody, BlockHeader, BlockNumber, H256, U256};
use crate::sentry::types::BlockId;

/// A function-scoped read-only transaction against the chain-data store.
///
/// Spec.md §3/§5: transactions are strictly function-scoped and released
/// on every exit path, including cancellation — callers must not hand one
/// across a task boundary. `rollback` is explicit so §9's note ("rolls
/// back the transaction twice, deferred + explicit") has somewhere
/// idiomatic to land: implementors may also roll back on `Drop`, matching
/// the teacher's `mdbx` transaction type, making an explicit call here a
/// harmless no-op rather than a double-free.
pub trait ReadTransaction: Send + Sync {
    fn rollback(self: Box<Self>);
}

/// Read-only temporal store (`ChainStore`, spec.md §3) — the sole place
/// header/body/query semantics (skip/origin/reverse, frozen segments) are
/// resolved. An external collaborator; persistent storage itself is a
/// non-goal for this crate (spec.md §1).
pub trait ChainStore: Send + Sync {
    fn begin_ro(&self) -> anyhow::Result<Box<dyn ReadTransaction>>;

    fn get_block_headers(
        &self,
        tx: &dyn ReadTransaction,
        start: BlockId,
        amount: u64,
        skip: u64,
        reverse: bool,
    ) -> anyhow::Result<Vec<BlockHeader>>;

    fn get_block_bodies(
        &self,
        tx: &dyn ReadTransaction,
        hashes: &[H256],
    ) -> anyhow::Result<Vec<Option<BlockBody>>>;
}

/// Indirect access to frozen/snapshot chain segments, kept separate from
/// `ChainStore` per spec.md §3's data model (the two are distinct fields on
/// `MultiClient`).
pub trait BlockReader: Send + Sync {
    fn canonical_hash(&self, number: BlockNumber) -> anyhow::Result<Option<H256>>;
}

/// Consulted only for the header-verification hooks some queries need
/// (spec.md §3) — block execution and consensus proper are non-goals here.
pub trait ConsensusEngine: Send + Sync {
    fn verify_header(&self, header: &BlockHeader) -> anyhow::Result<()>;
}

/// The chain-status handshake payload, refreshed before each stream
/// subscribes (spec.md §4.1: "sentry must hold it before subscribing").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub network_id: u64,
    pub total_difficulty: U256,
    pub best_hash: H256,
    pub genesis_hash: H256,
}

pub trait StatusProvider: Send + Sync {
    fn status(&self) -> StatusMessage;
}

/// A cache/generator for receipts, with an embedded TTL (spec.md §3).
/// Receipt *construction* — replaying a block's transactions — is out of
/// scope; this trait only exposes the two lookups C5 needs.
pub trait ReceiptsGetter: Send + Sync {
    /// `None` at index `i` means hash `i` wasn't in cache; the caller falls
    /// through to `get` for the remainder.
    fn get_cached(
        &self,
        hashes: &[H256],
    ) -> Vec<Option<Vec<crate::sentry::types::Receipt>>>;

    fn get(
        &self,
        tx: &dyn ReadTransaction,
        hashes: &[H256],
    ) -> anyhow::Result<Vec<Option<Vec<crate::sentry::types::Receipt>>>>;
}
