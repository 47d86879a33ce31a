use crate::sentry::downloader::BodyDownload;
use crate::sentry::error::RouterError;
use crate::sentry::types::{BlockBodiesMessage, InboundMessage};
use std::sync::Arc;
use tracing::trace;

/// C4: the only handler of `BlockBodies66` — decodes the packet and hands
/// it straight to `BodyDownload` (spec.md §4.4). No state of its own.
pub struct BodyIngest {
    body_download: Arc<dyn BodyDownload>,
}

impl BodyIngest {
    pub fn new(body_download: Arc<dyn BodyDownload>) -> Self {
        Self { body_download }
    }

    pub async fn on_block_bodies(&self, msg: InboundMessage) -> Result<(), RouterError> {
        let reply: BlockBodiesMessage = rlp::decode(&msg.data).map_err(|e| RouterError::InvalidEncoding {
            peer_id: msg.peer_id,
            source: e.into(),
        })?;

        if reply.bodies.iter().all(|b| b.is_empty()) {
            trace!(peer = ?msg.peer_id, "empty BlockBodies66 packet, dropping");
            return Ok(());
        }

        self.body_download
            .deliver_bodies(reply.bodies, msg.data.len(), msg.peer_id);

        Ok(())
    }
}
