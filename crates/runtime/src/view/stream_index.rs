//! Stream-index lookup for Replex segments

use super::AddressLocator;
use crate::{LogRuntime, Result, RuntimeError};
use async_trait::async_trait;
use sharedlog_common::{Address, LogEntry, StreamId, StreamTails};

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamIndexLocator;

#[async_trait]
impl AddressLocator for StreamIndexLocator {
    async fn locate(
        &self,
        runtime: &LogRuntime,
        stream: StreamId,
        _tails: &StreamTails,
        after: Option<Address>,
        up_to: Address,
    ) -> Result<Vec<LogEntry>> {
        let address_space = runtime.address_space();
        let log_unit = runtime.log_unit_service();

        // The index only knows written addresses; settle the rest first
        for address in log_unit.unwritten(after, up_to).await? {
            address_space.read_or_fill(address).await?;
        }

        let mut found = Vec::new();
        for address in log_unit.stream_addresses(stream, after, up_to).await? {
            let entry = address_space.read(address).await?.ok_or_else(|| {
                RuntimeError::Unavailable(format!("indexed address {address} is unreadable"))
            })?;
            found.push(entry);
        }
        Ok(found)
    }
}
