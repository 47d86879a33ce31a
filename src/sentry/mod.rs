//! The multi-sentry p2p message router: fans gRPC streams out to sentry
//! processes, dispatches eth/66 wire messages to the right handler, and
//! drives the header/body download state machines plus the outbound query
//! responder (spec.md §2).

pub mod body_ingest;
pub mod clock;
pub mod dispatcher;
pub mod downloader;
pub mod error;
pub mod handle;
pub mod header_ingest;
#[cfg(test)]
pub mod mock;
pub mod multi_client;
pub mod outbound;
pub mod peer;
pub mod peer_events;
pub mod query;
pub mod segment;
pub mod store;
pub mod supervisor;
pub mod types;

pub use error::RouterError;
pub use multi_client::{MultiClient, MultiClientConfig};
