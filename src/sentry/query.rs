use crate::sentry::error::RouterError;
use crate::sentry::outbound::OutboundGateway;
use crate::sentry::store::{BlockReader, ChainStore, ConsensusEngine, ReceiptsGetter};
use crate::sentry::types::{
    BlockBodiesMessage, BlockHeaders, GetBlockBodies, GetBlockHeaders, GetReceipts, InboundMessage,
    Message, ReceiptsMessage,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// C5: answers a peer's `GetBlockHeaders66`/`GetBlockBodies66`/`GetReceipts66`
/// by reading from the chain store (spec.md §4.5). Never mutates HD/BD —
/// the one component that only ever talks to the store and the gateway.
pub struct QueryResponder {
    store: Arc<dyn ChainStore>,
    receipts: Arc<dyn ReceiptsGetter>,
    outbound: Arc<OutboundGateway>,
    /// Spec.md §3: "used only to answer queries that require header
    /// verification hooks" — consulted in `on_get_block_headers` to drop
    /// any header that fails verification before it's served to a peer.
    consensus: Arc<dyn ConsensusEngine>,
    /// Spec.md §3: indirect access to frozen/snapshot segments — consulted
    /// alongside `consensus` to cross-check a served header's hash against
    /// the independently-recorded canonical hash at that height.
    block_reader: Arc<dyn BlockReader>,
    /// Bounds full (non-cached) receipt lookups to one in flight at a time
    /// — spec.md §4.5/§5: acquired before the store transaction opens,
    /// released after it rolls back, on every exit path including error.
    receipts_lookup: Semaphore,
}

impl QueryResponder {
    pub fn new(
        store: Arc<dyn ChainStore>,
        receipts: Arc<dyn ReceiptsGetter>,
        outbound: Arc<OutboundGateway>,
        consensus: Arc<dyn ConsensusEngine>,
        block_reader: Arc<dyn BlockReader>,
    ) -> Self {
        Self {
            store,
            receipts,
            outbound,
            consensus,
            block_reader,
            receipts_lookup: Semaphore::new(1),
        }
    }

    fn invalid(peer_id: crate::models::PeerId, source: impl Into<anyhow::Error>) -> RouterError {
        RouterError::InvalidEncoding {
            peer_id,
            source: source.into(),
        }
    }

    /// Always replies, even with an empty header list — the peer is waiting
    /// on the `requestId` round-trip regardless (spec.md §4.5).
    pub async fn on_get_block_headers(&self, msg: InboundMessage, sentry_id: usize) -> Result<(), RouterError> {
        let request: GetBlockHeaders =
            rlp::decode(&msg.data).map_err(|e| Self::invalid(msg.peer_id, e))?;

        let headers = {
            let tx = self.store.begin_ro().map_err(RouterError::Store)?;
            let result = self.store.get_block_headers(
                tx.as_ref(),
                request.params.start,
                request.params.limit,
                request.params.skip,
                request.params.reverse != 0,
            );
            tx.rollback();
            result.map_err(RouterError::Store)?
        };

        // spec.md §3: a header the consensus engine rejects, or whose hash
        // disagrees with the independently-tracked canonical hash at that
        // height, is dropped rather than served — the two collaborators'
        // only job here is this verification hook, not building the reply.
        let headers: Vec<_> = headers
            .into_iter()
            .filter(|header| {
                if let Err(e) = self.consensus.verify_header(header) {
                    debug!(sentry = sentry_id, number = header.number.0, error = %e, "dropping header failing consensus verification");
                    return false;
                }
                match self.block_reader.canonical_hash(header.number) {
                    Ok(Some(canonical)) if canonical != header.hash() => {
                        debug!(sentry = sentry_id, number = header.number.0, "dropping header that disagrees with the canonical snapshot hash");
                        false
                    }
                    _ => true,
                }
            })
            .collect();

        let reply = Message::BlockHeaders(BlockHeaders::new(request.request_id, headers));
        if let Err(e) = self.outbound.send_message_by_id(sentry_id, msg.peer_id, reply).await {
            warn!(sentry = sentry_id, error = %e, "failed to answer GetBlockHeaders66");
        }
        Ok(())
    }

    /// Bodies are re-served from whatever raw form the store hands back —
    /// there is no re-encoding step that could drift from what the peer
    /// that originally sent them would recognize (spec.md §4.5).
    pub async fn on_get_block_bodies(&self, msg: InboundMessage, sentry_id: usize) -> Result<(), RouterError> {
        let request: GetBlockBodies =
            rlp::decode(&msg.data).map_err(|e| Self::invalid(msg.peer_id, e))?;

        let bodies = {
            let tx = self.store.begin_ro().map_err(RouterError::Store)?;
            let result = self.store.get_block_bodies(tx.as_ref(), &request.hashes);
            tx.rollback();
            result.map_err(RouterError::Store)?
        };
        let bodies = bodies.into_iter().flatten().collect();

        let reply = Message::BlockBodies(BlockBodiesMessage::new(request.request_id, bodies));
        if let Err(e) = self.outbound.send_message_by_id(sentry_id, msg.peer_id, reply).await {
            warn!(sentry = sentry_id, error = %e, "failed to answer GetBlockBodies66");
        }
        Ok(())
    }

    /// Two-stage lookup: serve whatever's already cached immediately, then
    /// fall through to a full store read (serialized behind a single
    /// permit) only for the remainder (spec.md §4.5).
    pub async fn on_get_receipts(&self, msg: InboundMessage, sentry_id: usize) -> Result<(), RouterError> {
        let request: GetReceipts = rlp::decode(&msg.data).map_err(|e| Self::invalid(msg.peer_id, e))?;

        let cached = self.receipts.get_cached(&request.hashes);
        let missing: Vec<_> = request
            .hashes
            .iter()
            .zip(cached.iter())
            .filter(|(_, hit)| hit.is_none())
            .map(|(hash, _)| *hash)
            .collect();

        let mut receipts = cached;
        if !missing.is_empty() {
            let permit = self
                .receipts_lookup
                .acquire()
                .await
                .expect("semaphore never closed");
            let tx = self.store.begin_ro().map_err(RouterError::Store)?;
            let fetched = self.receipts.get(tx.as_ref(), &missing);
            tx.rollback();
            drop(permit);
            let fetched = fetched.map_err(RouterError::Store)?;

            let mut fetched = fetched.into_iter();
            for slot in receipts.iter_mut() {
                if slot.is_none() {
                    if let Some(next) = fetched.next() {
                        *slot = next;
                    }
                }
            }
        }

        let receipts: Vec<_> = receipts.into_iter().map(Option::unwrap_or_default).collect();
        let missing_count = receipts.iter().filter(|r| r.is_empty()).count();
        if missing_count > 0 {
            debug!(sentry = sentry_id, missing_count, "GetReceipts66: some hashes unresolved");
        }

        let reply = Message::Receipts(ReceiptsMessage::new(request.request_id, receipts));
        if let Err(e) = self.outbound.send_message_by_id(sentry_id, msg.peer_id, reply).await {
            warn!(sentry = sentry_id, error = %e, "failed to answer GetReceipts66");
        }
        Ok(())
    }
}
