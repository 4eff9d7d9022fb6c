//! # nbs-core
//!
//! File-backed coordination primitives for agents sharing one project
//! directory on one host.
//!
//! Everything lives in ordinary files, so any process that follows the
//! locking and rename rules can take part:
//! - `nbs-chat` CLI (create, send, read, poll)
//! - `nbs-bus` CLI (publish, check, ack, prune)
//! - any program linking this crate directly
//!
//! ## Key Concepts
//!
//! - **Chat file**: one append-only conversation with a self-describing header
//!   and one base64 line per message
//! - **Cursor**: a reader's last-read message index, kept in `<chat>.cursors`
//! - **Events directory**: a queue of priority-tagged `.event` files, acked by
//!   moving them into `processed/`
//! - **Bridge**: turns each chat message and `@mention` into bus events

pub mod bridge;
pub mod bus;
pub mod chat;
pub mod clock;
pub mod codec;
pub mod exit;
pub mod lock;
pub mod paths;

// Re-export commonly used types
pub use bridge::BridgeReport;
pub use bus::{BusConfig, BusError, EventSummary, Priority, PublishOutcome};
pub use chat::{ChatError, ChatMessage, ChatState, PollOutcome};
pub use lock::{FileLock, LockError};
