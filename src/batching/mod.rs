//! Batching of log events into emails
//!
//! `tracing` delivers events one at a time. This module buffers them on a
//! background task and hands them to an [`EmailSink`](crate::EmailSink) in
//! batches, sized by [`BatchingOptions`].

mod config;
mod worker;

pub use config::BatchingOptions;
pub(crate) use worker::is_flushing;
pub use worker::{EmailSinkGuard, EventSender, spawn_batching};
