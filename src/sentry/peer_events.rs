use crate::sentry::handle::SharedSentryHandle;
use crate::sentry::peer::{PeerEvent, PeerEventKind};
use tracing::{debug, info, warn};

/// C6: logs peer connect/disconnect events. The only component that calls
/// `SentryHandle::peer_by_id`, and only when `log_peer_info` is set — a
/// failed metadata fetch is logged and otherwise ignored, never allowed to
/// stall the event stream (spec.md §4.6).
pub struct PeerEvents {
    log_peer_info: bool,
}

impl PeerEvents {
    pub fn new(log_peer_info: bool) -> Self {
        Self { log_peer_info }
    }

    pub async fn on_peer_event(&self, sentry: &SharedSentryHandle, sentry_id: usize, event: PeerEvent) {
        match event.kind {
            PeerEventKind::Connect => {
                if !self.log_peer_info {
                    debug!(sentry = sentry_id, peer = ?event.peer_id, "peer connected");
                    return;
                }

                match sentry.peer_by_id(event.peer_id).await {
                    Ok(Some(info)) => info!(
                        sentry = sentry_id,
                        peer = ?event.peer_id,
                        enode = ?info.enode_url,
                        client = ?info.client_id,
                        "peer connected"
                    ),
                    Ok(None) => info!(sentry = sentry_id, peer = ?event.peer_id, "peer connected, no metadata"),
                    Err(e) => warn!(sentry = sentry_id, peer = ?event.peer_id, error = %e, "peer_by_id failed, continuing"),
                }
            }
            PeerEventKind::Disconnect => {
                debug!(sentry = sentry_id, peer = ?event.peer_id, "peer disconnected");
            }
        }
    }
}
