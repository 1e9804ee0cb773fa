//! Service contracts consumed by the client core
//!
//! The sequencer, the log units and the layout service live on other
//! machines in a real deployment. The client core only depends on these
//! traits; `sharedlog-engine` provides in-memory implementations.

use crate::{Address, ConflictInfo, DataEntry, Layout, LogEntry, StreamId, StreamTails, TokenResponse};
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors reported by the remote services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Somebody else already wrote (or hole-filled) this address
    #[error("Address {0} has already been written")]
    Overwrite(Address),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// The ordering authority
#[async_trait]
pub trait SequencerService: Send + Sync {
    /// Reserve `count` consecutive addresses for `streams`
    ///
    /// With conflict info the sequencer may refuse, returning an abort
    /// classification instead of a fresh address.
    async fn next_token(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: Option<&ConflictInfo>,
    ) -> ServiceResult<TokenResponse>;

    /// Current tails without reserving anything
    async fn query(&self, streams: &BTreeSet<StreamId>) -> ServiceResult<StreamTails>;
}

/// Write-once storage of log addresses
#[async_trait]
pub trait LogUnitService: Send + Sync {
    /// Write an entry; fails with [`ServiceError::Overwrite`] if the address is taken
    async fn write(&self, address: Address, entry: DataEntry) -> ServiceResult<()>;

    /// Write a hole; fails with [`ServiceError::Overwrite`] if the address is taken
    async fn fill_hole(&self, address: Address) -> ServiceResult<()>;

    async fn read(&self, address: Address) -> ServiceResult<Option<LogEntry>>;

    /// Written addresses of `stream` within `(after, up_to]`, ascending
    async fn stream_addresses(
        &self,
        stream: StreamId,
        after: Option<Address>,
        up_to: Address,
    ) -> ServiceResult<Vec<Address>>;

    /// Addresses within `(after, up_to]` that hold neither data nor a hole
    async fn unwritten(&self, after: Option<Address>, up_to: Address)
    -> ServiceResult<Vec<Address>>;
}

#[async_trait]
pub trait LayoutService: Send + Sync {
    async fn layout(&self) -> ServiceResult<Layout>;
}
