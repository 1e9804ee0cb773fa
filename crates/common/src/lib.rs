//! Common types for the shared log
//!
//! This crate defines:
//! - Stream identifiers and global log addresses
//! - Tokens issued by the sequencer and their classification
//! - Conflict resolution info carried by optimistic transactions
//! - Log entries, including stream-copy markers and holes
//! - The service contracts (sequencer, log unit, layout) the client core consumes

mod address;
mod conflict;
mod entry;
mod layout;
mod service;
mod stream_id;
mod token;
mod transaction_id;

pub use address::Address;
pub use conflict::{AbortCause, ConflictInfo, Footprint};
pub use entry::{DataEntry, LogData, LogEntry, Payload};
pub use layout::{Layout, ReplicationMode, Segment};
pub use service::{LayoutService, LogUnitService, SequencerService, ServiceError, ServiceResult};
pub use stream_id::StreamId;
pub use token::{Backpointers, StreamAddresses, StreamTails, Token, TokenResponse, TokenType};
pub use transaction_id::TransactionId;
