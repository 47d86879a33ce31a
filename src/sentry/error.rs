use crate::models::PeerId;

/// Closed error taxonomy per spec.md §7. `Dispatcher::handle` (C2) inspects
/// `is_invalid_rlp` to decide whether to issue a `Kick`; everything else
/// passes straight back to the supervisor (C1) to log and continue.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Malformed RLP or a semantic sanity-check failure (e.g. a `NewBlock`
    /// whose header hash doesn't match its claimed body). Carries the
    /// originating peer so the dispatcher can penalize without re-deriving
    /// it from the inbound message.
    #[error("invalid encoding from peer {peer_id:?}: {source}")]
    InvalidEncoding {
        peer_id: PeerId,
        #[source]
        source: anyhow::Error,
    },

    /// The sentry reported the peer no longer exists. Always swallowed at
    /// the call site (§7 taxonomy entry 2); kept as a distinct variant so
    /// `is_peer_gone` can classify it wherever it surfaces.
    #[error("peer not found")]
    PeerGone,

    /// The chain-data store failed to begin a transaction or read. Logged,
    /// never penalized.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The downloader rejected a batch and returned penalties to apply.
    #[error("downloader rejected segment, {} penalties", .0.len())]
    DownloaderReject(Vec<crate::sentry::types::Penalty>),

    /// A handler panicked; the dispatcher's unwind barrier converted it
    /// into this variant so the stream stays alive (§9 "Panic barrier").
    #[error("handler for message id {message_id} panicked: {backtrace}")]
    Panic { message_id: i32, backtrace: String },

    /// An unrecognized wire tag reached the dispatcher.
    #[error("unimplemented message id {0:?}")]
    Unimplemented(i32),
}

impl RouterError {
    /// Classifies the error as "invalid RLP" for the dispatcher's penalty
    /// decision — a property of the error, not of which tag produced it
    /// (spec.md §4.2).
    pub fn is_invalid_rlp(&self) -> bool {
        matches!(self, Self::InvalidEncoding { .. })
    }

    pub fn is_peer_gone(&self) -> bool {
        matches!(self, Self::PeerGone)
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        match self {
            Self::InvalidEncoding { peer_id, .. } => Some(*peer_id),
            _ => None,
        }
    }
}

/// Recognizes the sentry's "peer not found" response regardless of which
/// RPC produced it, so C7 can swallow it uniformly (spec.md §4.7, §7).
pub fn is_peer_not_found(error: &anyhow::Error) -> bool {
    error
        .to_string()
        .to_lowercase()
        .contains("peer not found")
}
