use crate::models::PeerId;
use crate::sentry::error::is_peer_not_found;
use crate::sentry::handle::SharedSentryHandle;
use crate::sentry::types::{Message, OutboundMessage, Penalty, PenaltyKind};
use tracing::{debug, warn};

/// C7: the one place `OutboundMessage` leaves the process. Every send-by-id,
/// broadcast, penalize, and peer-min-block call goes through here so "peer
/// not found" is recognized and swallowed uniformly (spec.md §4.7, §7).
pub struct OutboundGateway {
    sentries: Vec<SharedSentryHandle>,
}

impl OutboundGateway {
    pub fn new(sentries: Vec<SharedSentryHandle>) -> Self {
        Self { sentries }
    }

    pub fn sentries(&self) -> &[SharedSentryHandle] {
        &self.sentries
    }

    fn sentry(&self, id: usize) -> Option<&SharedSentryHandle> {
        self.sentries.iter().find(|s| s.id() == id)
    }

    /// Sends `message` to exactly one peer via the given sentry.
    /// "peer not found" is swallowed — the peer disconnected between the
    /// decision to send and the send itself, which is not an error for the
    /// caller (spec.md §7 taxonomy entry 2).
    pub async fn send_message_by_id(
        &self,
        sentry_id: usize,
        peer_id: PeerId,
        message: Message,
    ) -> anyhow::Result<()> {
        let Some(sentry) = self.sentry(sentry_id) else {
            return Ok(());
        };
        match sentry.send_message_by_id(peer_id, OutboundMessage::from(message)).await {
            Ok(()) => Ok(()),
            Err(e) if is_peer_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Implements the send-header-request policy of spec.md §4.7: when the
    /// TTD has passed a request may be multicast to several peers (the
    /// downloader picked the count); otherwise it goes to exactly one
    /// random peer. Returns whether anything was actually sent.
    pub async fn send_header_request(
        &self,
        sentry_id: usize,
        message: Message,
        multi_peer: Option<u64>,
    ) -> anyhow::Result<bool> {
        let Some(sentry) = self.sentry(sentry_id) else {
            return Ok(false);
        };
        let max_peers = multi_peer.unwrap_or(1);
        match sentry
            .send_message_to_random_peers(max_peers, OutboundMessage::from(message))
            .await
        {
            Ok(sent) => Ok(sent > 0),
            Err(e) if is_peer_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Propagates a `NewBlockHashes` announce to up to `max_peers` peers on
    /// each sentry — `MultiClient`'s `maxBlockBroadcastPeers(header)` policy
    /// (spec.md §3) bounds the fan-out rather than reaching every peer the
    /// way `SendMessageToAll` would.
    pub async fn broadcast_new_block_hashes(&self, message: Message, max_peers: u64) -> anyhow::Result<()> {
        let outbound = OutboundMessage::from(message);
        for sentry in &self.sentries {
            if let Err(e) = sentry
                .send_message_to_random_peers(max_peers, outbound.clone())
                .await
            {
                if !is_peer_not_found(&e) {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Fans a set of penalties out to the sentry each originated on, unless
    /// the penalty doesn't name a home sentry — then it's broadcast to
    /// every sentry ready to accept it (spec.md §4.3 `NewBlock` penalty
    /// path: "skipping any direct in-process sentry that reports itself
    /// not ready").
    pub async fn penalize(&self, sentry_id: Option<usize>, penalties: &[Penalty]) {
        let targets: Vec<&SharedSentryHandle> = match sentry_id {
            Some(id) => self.sentry(id).into_iter().collect(),
            None => self.sentries.iter().filter(|s| s.is_ready()).collect(),
        };
        for penalty in penalties {
            for sentry in &targets {
                match sentry.penalize_peer(penalty.peer_id, PenaltyKind::Kick).await {
                    Ok(()) => {}
                    Err(e) if is_peer_not_found(&e) => {}
                    Err(e) => warn!(sentry = sentry.id(), peer = ?penalty.peer_id, error = %e, "penalize_peer failed"),
                }
            }
        }
    }

    pub async fn kick(&self, sentry_id: usize, peer_id: PeerId) {
        self.penalize(Some(sentry_id), &[Penalty::kick(peer_id)]).await;
    }

    pub async fn peer_min_block(&self, sentry_id: usize, peer_id: PeerId, min_block: u64) {
        let Some(sentry) = self.sentry(sentry_id) else {
            return;
        };
        match sentry.peer_min_block(peer_id, min_block).await {
            Ok(()) => {}
            Err(e) if is_peer_not_found(&e) => {}
            Err(e) => debug!(sentry = sentry_id, peer = ?peer_id, error = %e, "peer_min_block failed"),
        }
    }
}
