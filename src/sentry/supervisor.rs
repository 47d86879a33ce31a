use crate::sentry::dispatcher::Dispatcher;
use crate::sentry::handle::SharedSentryHandle;
use crate::sentry::peer_events::PeerEvents;
use crate::sentry::store::StatusProvider;
use crate::sentry::types::MessageId;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use tracing_futures::Instrument;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Spec.md §5/§8 P4: an inbound message over this size is rejected without
/// killing the stream. The sentry's own gRPC server enforces this on the
/// wire (out of scope here, spec.md §1); this is the application-layer
/// backstop for whatever still reaches the dispatcher.
const MAX_INBOUND_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// spec.md §4.1 item 1: exactly these four kinds, on their own stream.
// Receipts66 is unsolicited and has no subscribing stream (§4.5/§9's
// deliberate no-op handler is reachable only if an embedder's sentry
// happens to forward it on one of these IDs; it is not requested here).
const RECV_MESSAGE_IDS: [MessageId; 4] = [
    MessageId::NewBlockHashes66,
    MessageId::BlockHeaders66,
    MessageId::NewBlock66,
    MessageId::BlockBodies66,
];
const RECV_UPLOAD_IDS: [MessageId; 2] = [MessageId::GetBlockBodies66, MessageId::GetReceipts66];
const RECV_UPLOAD_HEADERS_IDS: [MessageId; 1] = [MessageId::GetBlockHeaders66];

/// C1: owns the reconnect loop for every stream of every sentry.
///
/// Each sentry gets four independent tasks — `RecvMessage` (the ingest
/// path: announces, headers, new blocks, bodies), `RecvUploadMessage` and
/// `RecvUploadHeadersMessage` (answering peers' own requests, C5's input),
/// and `PeerEvents` (C6) — mirroring the teacher's `sentry2::coordinator`
/// stream split. A stream failure backs off exponentially (500ms, doubling,
/// capped at 10s) and resets to 500ms on the first message received after
/// reconnecting; one sentry's backoff never serializes another's loops
/// (spec.md §4.1, §5).
pub struct StreamSupervisor {
    dispatcher: Arc<Dispatcher>,
    peer_events: Arc<PeerEvents>,
    status: Arc<dyn StatusProvider>,
}

impl StreamSupervisor {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        peer_events: Arc<PeerEvents>,
        status: Arc<dyn StatusProvider>,
    ) -> Self {
        Self {
            dispatcher,
            peer_events,
            status,
        }
    }

    /// Spawns all four loops for every sentry. Send `true` on the returned
    /// sender to stop every loop at its next stream poll or backoff sleep.
    pub fn run(&self, sentries: Vec<SharedSentryHandle>) -> (watch::Sender<bool>, Vec<JoinHandle<()>>) {
        let (tx, rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(sentries.len() * 4);

        for sentry in sentries {
            handles.push(self.spawn_message_loop(sentry.clone(), &RECV_MESSAGE_IDS, rx.clone()));
            handles.push(self.spawn_message_loop(sentry.clone(), &RECV_UPLOAD_IDS, rx.clone()));
            handles.push(self.spawn_message_loop(sentry.clone(), &RECV_UPLOAD_HEADERS_IDS, rx.clone()));
            handles.push(self.spawn_peer_events_loop(sentry, rx.clone()));
        }

        (tx, handles)
    }

    fn spawn_message_loop(
        &self,
        sentry: SharedSentryHandle,
        ids: &'static [MessageId],
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let status = self.status.clone();
        let span = tracing::info_span!("sentry_message_loop", sentry = sentry.id());
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                if *shutdown.borrow() {
                    return;
                }

                if let Err(e) = sentry.handshake(status.status()).await {
                    warn!(sentry = sentry.id(), error = %e, "handshake failed, retrying");
                    if sleep_or_shutdown(backoff, &mut shutdown).await {
                        return;
                    }
                    backoff = next_backoff(backoff);
                    continue;
                }

                let mut stream = match sentry.messages(ids.to_vec()).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(sentry = sentry.id(), error = %e, "failed to open message stream, retrying");
                        if sleep_or_shutdown(backoff, &mut shutdown).await {
                            return;
                        }
                        backoff = next_backoff(backoff);
                        continue;
                    }
                };

                backoff = INITIAL_BACKOFF;
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                        next = stream.next() => {
                            match next {
                                Some(Ok(msg)) => {
                                    if msg.data.len() > MAX_INBOUND_MESSAGE_SIZE {
                                        warn!(
                                            sentry = sentry.id(),
                                            peer = ?msg.peer_id,
                                            size = msg.data.len(),
                                            "dropping oversized inbound message"
                                        );
                                        continue;
                                    }
                                    if let Err(e) = dispatcher.handle(msg, sentry.id()).await {
                                        warn!(sentry = sentry.id(), error = %e, "message handler returned an error");
                                    }
                                }
                                Some(Err(e)) => {
                                    warn!(sentry = sentry.id(), error = %e, "message stream error, reconnecting");
                                    break;
                                }
                                None => {
                                    warn!(sentry = sentry.id(), "message stream closed, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }.instrument(span))
    }

    fn spawn_peer_events_loop(
        &self,
        sentry: SharedSentryHandle,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let peer_events = self.peer_events.clone();
        let span = tracing::info_span!("sentry_peer_events_loop", sentry = sentry.id());
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                if *shutdown.borrow() {
                    return;
                }

                let mut stream = match sentry.peer_events().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(sentry = sentry.id(), error = %e, "failed to open peer-events stream, retrying");
                        if sleep_or_shutdown(backoff, &mut shutdown).await {
                            return;
                        }
                        backoff = next_backoff(backoff);
                        continue;
                    }
                };

                backoff = INITIAL_BACKOFF;
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                        next = stream.next() => {
                            match next {
                                Some(Ok(event)) => peer_events.on_peer_event(&sentry, sentry.id(), event).await,
                                Some(Err(e)) => {
                                    warn!(sentry = sentry.id(), error = %e, "peer-events stream error, reconnecting");
                                    break;
                                }
                                None => {
                                    warn!(sentry = sentry.id(), "peer-events stream closed, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }.instrument(span))
    }
}

/// Sleeps for `backoff`, or returns early with the shutdown flag's value if
/// a shutdown is signaled first.
async fn sleep_or_shutdown(backoff: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
