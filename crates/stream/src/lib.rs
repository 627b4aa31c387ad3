//! Tickstream Server
//!
//! A resumable, clock-aligned Server-Sent Events stream over a static dataset.
//!
//! # Features
//!
//! - **Clock-aligned ticks**: one event per fixed interval, aligned on the Unix epoch
//! - **Cyclic dataset**: tick `t` serves record `t mod N`
//! - **Resumption**: opaque, namespaced event IDs let clients pick up where they left off
//! - **Bounded backfill**: a reconnecting client is replayed at most `max_backfill` ticks
//! - **Snapshot**: the whole dataset is also available as a single JSON array
//!
//! # Example
//!
//! ```rust,no_run
//! use tickstream::{server, types::ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ServerOptions {
//!         port: 8080,
//!         host: "127.0.0.1".to_string(),
//!         ..Default::default()
//!     };
//!
//!     server::start_server(options).await.unwrap();
//! }
//! ```
//!
//! # Protocol
//!
//! ## Snapshot
//!
//! ```text
//! GET /countries HTTP/1.1
//!
//! Response: 200 OK
//! Content-Type: application/json
//!
//! [{"id": 4, "name": "Afghanistan"}, ...]
//! ```
//!
//! ## Stream
//!
//! ```text
//! GET /countries/stream HTTP/1.1
//! Accept: text/event-stream
//! Last-Event-ID: Y291bnRyeS00MjUwMDAwMDE
//!
//! data: {"id":8,"name":"Albania"}
//! id: Y291bnRyeS00MjUwMDAwMDI
//! event: country
//! retry: 10000
//! : 2023-11-14T22:13:28.000Z
//! ```

pub mod clock;
pub mod cursor;
pub mod dataset;
pub mod docs;
pub mod engine;
pub mod server;
pub mod types;

// Re-export commonly used items
pub use clock::{Clock, SharedClock, SystemClock, TokioClock};
pub use cursor::{CursorCodec, CursorError, decode_id, encode_id};
pub use dataset::{Dataset, DatasetError, DatasetSource};
pub use engine::{CancelHandle, Session, SessionState, StreamEngine, resume_tick};
pub use server::{AppState, ServerError, create_router, serve, start_server};
pub use types::{ServerOptions, StreamConfigError, StreamOptions, TickEvent};
