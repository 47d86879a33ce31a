use crate::chain::ChainConfig;
use crate::models::BlockHeader;
use crate::sentry::body_ingest::BodyIngest;
use crate::sentry::clock::{Clock, SystemClock};
use crate::sentry::dispatcher::Dispatcher;
use crate::sentry::downloader::{BodyDownload, HeaderDownload};
use crate::sentry::handle::SharedSentryHandle;
use crate::sentry::header_ingest::HeaderIngest;
use crate::sentry::outbound::OutboundGateway;
use crate::sentry::peer_events::PeerEvents;
use crate::sentry::query::QueryResponder;
use crate::sentry::store::{BlockReader, ChainStore, ConsensusEngine, ReceiptsGetter, StatusProvider};
use crate::sentry::supervisor::StreamSupervisor;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything spec.md §3's data model lists: the shared state and
/// component wiring for one running router. Construction takes ownership
/// of all the external collaborators; `run` starts C1's loops and returns a
/// handle to stop them.
pub struct MultiClient {
    supervisor: StreamSupervisor,
    sentries: Vec<SharedSentryHandle>,
}

#[allow(clippy::too_many_arguments)]
pub struct MultiClientConfig {
    pub sentries: Vec<SharedSentryHandle>,
    pub header_download: Arc<dyn HeaderDownload>,
    pub body_download: Arc<dyn BodyDownload>,
    pub store: Arc<dyn ChainStore>,
    pub receipts: Arc<dyn ReceiptsGetter>,
    /// Spec.md §3: read-only, consulted only by the query responder's
    /// header-verification hook (C5).
    pub consensus: Arc<dyn ConsensusEngine>,
    /// Spec.md §3: read-only access to frozen/snapshot segments, consulted
    /// alongside `consensus` by the query responder.
    pub block_reader: Arc<dyn BlockReader>,
    pub status: Arc<dyn StatusProvider>,
    pub chain_config: ChainConfig,
    pub disable_block_download: bool,
    pub log_peer_info: bool,
    pub is_mock: bool,
    /// `MultiClient`'s `maxBlockBroadcastPeers(header)` policy (spec.md
    /// §3); `None` uses `HeaderIngest`'s built-in default.
    pub max_block_broadcast_peers: Option<Arc<dyn Fn(&BlockHeader) -> u64 + Send + Sync>>,
}

impl MultiClient {
    pub fn new(config: MultiClientConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MultiClientConfig, clock: Arc<dyn Clock>) -> Self {
        let outbound = Arc::new(OutboundGateway::new(config.sentries.clone()));

        let header_ingest = Arc::new(match config.max_block_broadcast_peers {
            Some(policy) => HeaderIngest::with_broadcast_policy(
                config.header_download,
                config.body_download.clone(),
                config.store.clone(),
                outbound.clone(),
                clock,
                config.chain_config,
                config.disable_block_download,
                config.is_mock,
                policy,
            ),
            None => HeaderIngest::new(
                config.header_download,
                config.body_download.clone(),
                config.store.clone(),
                outbound.clone(),
                clock,
                config.chain_config,
                config.disable_block_download,
                config.is_mock,
            ),
        });
        let body_ingest = Arc::new(BodyIngest::new(config.body_download));
        let query_responder = Arc::new(QueryResponder::new(
            config.store,
            config.receipts,
            outbound.clone(),
            config.consensus,
            config.block_reader,
        ));
        let dispatcher = Arc::new(Dispatcher::new(header_ingest, body_ingest, query_responder, outbound));
        let peer_events = Arc::new(PeerEvents::new(config.log_peer_info));

        let supervisor = StreamSupervisor::new(dispatcher, peer_events, config.status);

        Self {
            supervisor,
            sentries: config.sentries,
        }
    }

    /// Starts every sentry's four stream loops. Send `true` on the returned
    /// sender to stop them; join the handles to wait for a clean shutdown.
    pub fn run(&self) -> (watch::Sender<bool>, Vec<JoinHandle<()>>) {
        self.supervisor.run(self.sentries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockHeader, BlockNumber, PeerId, U256};
    use crate::sentry::mock::*;
    use crate::sentry::store::StatusMessage;
    use crate::sentry::types::{GetBlockHeaders, InboundMessage, MessageId, NewBlock, NewBlockHashes};

    fn status() -> StatusMessage {
        StatusMessage {
            network_id: 1,
            total_difficulty: U256::zero(),
            best_hash: Default::default(),
            genesis_hash: Default::default(),
        }
    }

    fn wiring() -> (Arc<HeaderIngest>, Arc<MockHeaderDownload>, Arc<MockBodyDownload>, Arc<MockSentryHandle>) {
        let header_download = Arc::new(MockHeaderDownload::default());
        let body_download = Arc::new(MockBodyDownload::default());
        let store = Arc::new(MockChainStore::default());
        let sentry = shared_sentry(1);
        let outbound = Arc::new(OutboundGateway::new(vec![sentry.clone()]));

        let header_ingest = Arc::new(HeaderIngest::new(
            header_download.clone(),
            body_download.clone(),
            store,
            outbound,
            Arc::new(SystemClock),
            ChainConfig::new(1, Some(U256::from(1000u64))),
            false,
            false,
        ));

        (header_ingest, header_download, body_download, sentry)
    }

    // S1: a NewBlockHashes66 announce for an unknown hash triggers exactly
    // one GetBlockHeaders66 request to the announcing peer.
    #[tokio::test]
    async fn s1_unknown_announce_triggers_header_request() {
        let (header_ingest, header_download, _body_download, sentry) = wiring();
        header_download.initial_cycle.store(false, std::sync::atomic::Ordering::Relaxed);

        let hash = crate::models::H256::repeat_byte(0x11);
        let announce = NewBlockHashes::new(vec![(hash, BlockNumber(5))]);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x01),
            id: MessageId::NewBlockHashes66 as i32,
            data: bytes::Bytes::from(rlp::encode(&announce).to_vec()),
        };

        header_ingest.on_new_block_hashes(msg, 1).await.unwrap();

        assert_eq!(sentry.sent_by_id.lock().len(), 1);
        let (peer, sent) = &sentry.sent_by_id.lock()[0];
        assert_eq!(*peer, PeerId::repeat_byte(0x01));
        let request: GetBlockHeaders = rlp::decode(&sent.data).unwrap();
        assert_eq!(request.params.limit, 1);
    }

    // S1 continued: an announce for an already-linked hash sends nothing.
    #[tokio::test]
    async fn known_announce_sends_nothing() {
        let (header_ingest, header_download, _body_download, sentry) = wiring();
        let hash = crate::models::H256::repeat_byte(0x22);
        header_download.links.lock().insert(hash);

        let announce = NewBlockHashes::new(vec![(hash, BlockNumber(5))]);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x01),
            id: MessageId::NewBlockHashes66 as i32,
            data: bytes::Bytes::from(rlp::encode(&announce).to_vec()),
        };

        header_ingest.on_new_block_hashes(msg, 1).await.unwrap();
        assert!(sentry.sent_by_id.lock().is_empty());
    }

    // S2: disableBlockDownload suppresses announce handling entirely.
    #[tokio::test]
    async fn disabled_block_download_ignores_announces() {
        let header_download = Arc::new(MockHeaderDownload::default());
        let body_download = Arc::new(MockBodyDownload::default());
        let store = Arc::new(MockChainStore::default());
        let sentry = shared_sentry(1);
        let outbound = Arc::new(OutboundGateway::new(vec![sentry.clone()]));
        let header_ingest = HeaderIngest::new(
            header_download,
            body_download,
            store,
            outbound,
            Arc::new(SystemClock),
            ChainConfig::new(1, None),
            true,
            false,
        );

        let hash = crate::models::H256::repeat_byte(0x33);
        let announce = NewBlockHashes::new(vec![(hash, BlockNumber(5))]);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x01),
            id: MessageId::NewBlockHashes66 as i32,
            data: bytes::Bytes::from(rlp::encode(&announce).to_vec()),
        };

        header_ingest.on_new_block_hashes(msg, 1).await.unwrap();
        assert!(sentry.sent_by_id.lock().is_empty());
    }

    // S3: a BlockHeaders66 packet is sorted ascending before reaching HD,
    // and the reported max number drives PeerMinBlock.
    #[tokio::test]
    async fn s3_block_headers_sorted_ascending_and_reports_max() {
        let (header_ingest, header_download, _body_download, sentry) = wiring();

        let headers = vec![
            BlockHeader { number: BlockNumber(3), ..Default::default() },
            BlockHeader { number: BlockNumber(1), ..Default::default() },
            BlockHeader { number: BlockNumber(2), ..Default::default() },
        ];
        let reply = crate::sentry::types::BlockHeaders::new(7, headers);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x02),
            id: MessageId::BlockHeaders66 as i32,
            data: bytes::Bytes::from(rlp::encode(&reply).to_vec()),
        };

        header_ingest.on_block_headers(msg, 1).await.unwrap();

        let processed = header_download.processed.lock();
        let numbers: Vec<u64> = processed.iter().map(|h| h.number.0).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        drop(processed);

        assert_eq!(sentry.peer_min_blocks.lock().last().unwrap().1, 3);
    }

    // S4: an empty BlockHeaders66 packet is a silent no-op.
    #[tokio::test]
    async fn s4_empty_block_headers_packet_is_noop() {
        let (header_ingest, header_download, _body_download, sentry) = wiring();
        let reply = crate::sentry::types::BlockHeaders::new(9, vec![]);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x02),
            id: MessageId::BlockHeaders66 as i32,
            data: bytes::Bytes::from(rlp::encode(&reply).to_vec()),
        };

        header_ingest.on_block_headers(msg, 1).await.unwrap();
        assert!(header_download.processed.lock().is_empty());
        assert!(sentry.peer_min_blocks.lock().is_empty());
    }

    // S5: NewBlock66 hashes off the raw header bytes, prefetches the body,
    // and propagates a NewBlockHashes announce pre-TTD.
    #[tokio::test]
    async fn s5_new_block_prefetches_body_and_propagates() {
        let (header_ingest, header_download, body_download, sentry) = wiring();

        let header = BlockHeader {
            number: BlockNumber(42),
            gas_limit: 100,
            gas_used: 10,
            ..Default::default()
        };
        let block = Block { header, body: Default::default() };
        let new_block = NewBlock::new(block, 500);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x03),
            id: MessageId::NewBlock66 as i32,
            data: bytes::Bytes::from(rlp::encode(&new_block).to_vec()),
        };

        header_ingest.on_new_block(msg, 1).await.unwrap();

        assert_eq!(body_download.prefetched.lock().len(), 1);
        assert_eq!(header_download.processed.lock().len(), 1);
        assert_eq!(sentry.broadcasts.lock().len(), 1);
    }

    // S6: NewBlock66 with gas_used > gas_limit is rejected as invalid RLP
    // (a sanity-check failure, spec.md §7), not silently accepted.
    #[tokio::test]
    async fn s6_new_block_sanity_check_rejects_bad_gas() {
        let (header_ingest, _header_download, _body_download, _sentry) = wiring();

        let header = BlockHeader {
            number: BlockNumber(1),
            gas_limit: 10,
            gas_used: 20,
            ..Default::default()
        };
        let block = Block { header, body: Default::default() };
        let new_block = NewBlock::new(block, 0);
        let msg = InboundMessage {
            peer_id: PeerId::repeat_byte(0x04),
            id: MessageId::NewBlock66 as i32,
            data: bytes::Bytes::from(rlp::encode(&new_block).to_vec()),
        };

        let err = header_ingest.on_new_block(msg, 1).await.unwrap_err();
        assert!(err.is_invalid_rlp());
    }

    #[test]
    fn status_builder_round_trips_fields() {
        let s = status();
        assert_eq!(s.network_id, 1);
    }
}
