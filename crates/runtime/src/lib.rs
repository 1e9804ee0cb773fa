//! Client core of the shared log
//!
//! This crate provides:
//! - A sequencer client that requests tokens and classifies the answers
//! - Address-space writes, hole fills and reader-side wait-then-fill
//! - The append/retry loop that turns a token into a durable entry
//! - Copy-on-write stream cloning
//! - Stream views reconstructing a single stream from the shared log

mod address_space;
mod config;
mod error;
mod multistream;
mod runtime;
mod sequencer;
pub mod view;

pub use address_space::AddressSpaceView;
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use multistream::MultiStreamView;
pub use runtime::LogRuntime;
pub use sequencer::SequencerView;
pub use view::{BackpointerStreamView, StreamIndexView, StreamView};
