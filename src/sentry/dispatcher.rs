use crate::sentry::body_ingest::BodyIngest;
use crate::sentry::error::RouterError;
use crate::sentry::header_ingest::HeaderIngest;
use crate::sentry::outbound::OutboundGateway;
use crate::sentry::query::QueryResponder;
use crate::sentry::types::{InboundMessage, MessageId};
use futures_util::FutureExt;
use std::{convert::TryFrom, panic::AssertUnwindSafe, sync::Arc};
use tracing::{error, warn};

/// C2: the single entry point every inbound message passes through before
/// reaching a handler. Tag-switches on the wire id, recovers from handler
/// panics, and applies the invalid-RLP penalty — spec.md §4.2.
pub struct Dispatcher {
    header_ingest: Arc<HeaderIngest>,
    body_ingest: Arc<BodyIngest>,
    query_responder: Arc<QueryResponder>,
    outbound: Arc<OutboundGateway>,
}

impl Dispatcher {
    pub fn new(
        header_ingest: Arc<HeaderIngest>,
        body_ingest: Arc<BodyIngest>,
        query_responder: Arc<QueryResponder>,
        outbound: Arc<OutboundGateway>,
    ) -> Self {
        Self {
            header_ingest,
            body_ingest,
            query_responder,
            outbound,
        }
    }

    /// Handles one message from `sentry_id`. Errors are logged by the
    /// caller (the supervisor loop); this method's own job is purely the
    /// tag-switch, the panic barrier, and the invalid-RLP penalty.
    pub async fn handle(&self, msg: InboundMessage, sentry_id: usize) -> Result<(), RouterError> {
        let message_id = msg.id;
        let result = AssertUnwindSafe(self.dispatch(msg.clone(), sentry_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(RouterError::Panic {
                    message_id,
                    backtrace: panic_message(panic),
                })
            });

        if let Err(err) = &result {
            if err.is_invalid_rlp() {
                if let Some(peer_id) = err.peer_id() {
                    warn!(sentry = sentry_id, peer = ?peer_id, "invalid RLP, kicking peer");
                    self.outbound.kick(sentry_id, peer_id).await;
                }
            } else if matches!(err, RouterError::Panic { .. }) {
                error!(sentry = sentry_id, error = %err, "handler panicked");
            }
        }

        result
    }

    async fn dispatch(&self, msg: InboundMessage, sentry_id: usize) -> Result<(), RouterError> {
        let id = MessageId::try_from(msg.id).map_err(|_| RouterError::Unimplemented(msg.id))?;
        match id {
            MessageId::NewBlockHashes66 => {
                self.header_ingest.on_new_block_hashes(msg, sentry_id).await
            }
            MessageId::BlockHeaders66 => self.header_ingest.on_block_headers(msg, sentry_id).await,
            MessageId::NewBlock66 => self.header_ingest.on_new_block(msg, sentry_id).await,
            MessageId::BlockBodies66 => self.body_ingest.on_block_bodies(msg).await,
            MessageId::GetBlockHeaders66 => {
                self.query_responder.on_get_block_headers(msg, sentry_id).await
            }
            MessageId::GetBlockBodies66 => {
                self.query_responder.on_get_block_bodies(msg, sentry_id).await
            }
            MessageId::GetReceipts66 => self.query_responder.on_get_receipts(msg, sentry_id).await,
            // Unsolicited receipts: deliberate no-op, spec.md §4.5/§9 open
            // question — this node never consumes peer receipts here.
            MessageId::Receipts66 => Ok(()),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
