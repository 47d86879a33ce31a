use crate::models::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEventKind {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerEvent {
    pub peer_id: PeerId,
    pub kind: PeerEventKind,
}

/// Best-effort peer metadata, fetched only when `log_peer_info` is set
/// (spec.md §4.6). Absence of any field just means the sentry didn't have
/// it handy yet, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerInfo {
    pub enode_url: Option<String>,
    pub client_id: Option<String>,
    pub capabilities: Vec<String>,
}
