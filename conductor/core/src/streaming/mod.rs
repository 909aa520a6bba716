//! Reply Streaming
//!
//! Turns a provider's raw reply channel into typed, generation-stamped
//! events the Conductor can apply to the conversation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ProviderEvent   ┌──────────────────────────────┐
//! │ reply task   │ ───────────────► │ SendStream (generation N)    │
//! │ (spawned)    │   mpsc channel   │  ┌────────────────────────┐  │
//! └──────────────┘                  │  │ DemuxedChunk::classify │  │
//!                                   │  └───────────┬────────────┘  │
//!                                   └──────────────┼───────────────┘
//!                                                  ▼
//!                          StampedEvent { generation: N, item }
//!                                                  │
//!                                                  ▼
//!                            Conductor::apply (drops stale N)
//! ```
//!
//! A stream yields zero or more [`SendEvent`]s followed by exactly one
//! terminal item, `Completed` or `Failed`.

mod demux;
mod send_stream;

pub use demux::{DemuxedChunk, SendEvent};
pub use send_stream::{SendStream, StampedEvent, StreamItem, StreamPoll};
