//! Replicated objects on the shared log
//!
//! Objects are state machines whose commands are log entries: every client
//! that replays an object's stream arrives at the same state. Optimistic
//! transactions group commands on several objects into one entry, committed
//! only if nothing they read changed since their snapshot.

mod error;
mod map;
mod objects;
pub mod record;

pub use error::{ObjectError, Result};
pub use map::{MapKey, MapValue, SharedMap};
pub use objects::ObjectsView;
