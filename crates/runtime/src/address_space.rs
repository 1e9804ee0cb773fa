//! Address-space reads and writes
//!
//! Writes go to the address a token reserved. Every address below the tail
//! ends up holding either data or a hole: readers that find an address still
//! unwritten after a grace period fill it themselves.

use crate::{LogRuntime, Result, RuntimeError};
use sharedlog_common::{Address, DataEntry, LogData, LogEntry, Payload, TokenResponse};

#[derive(Clone)]
pub struct AddressSpaceView {
    runtime: LogRuntime,
}

impl AddressSpaceView {
    pub(crate) fn new(runtime: LogRuntime) -> Self {
        Self { runtime }
    }

    /// Write `payload` at the token's address
    ///
    /// The entry belongs to every stream the token carries a backpointer for.
    /// Fails with [`RuntimeError::Overwrite`] if the address was taken first.
    pub async fn write(&self, response: &TokenResponse, payload: Payload) -> Result<Address> {
        let address = match response.address() {
            Some(address) if response.is_writable() => address,
            _ => return Err(RuntimeError::InvalidToken(response.response_type)),
        };

        let entry = DataEntry {
            streams: response.backpointers.keys().copied().collect(),
            backpointers: response.backpointers.clone(),
            stream_addresses: response.stream_addresses.clone(),
            payload,
        };
        self.runtime.log_unit_service().write(address, entry).await?;
        Ok(address)
    }

    /// Claim `address` with a hole
    pub async fn fill_hole(&self, address: Address) -> Result<()> {
        Ok(self.runtime.log_unit_service().fill_hole(address).await?)
    }

    /// Fill a hole, treating an already written address as success
    pub(crate) async fn fill_hole_if_unwritten(&self, address: Address) -> Result<()> {
        match self.fill_hole(address).await {
            Ok(()) | Err(RuntimeError::Overwrite(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn read(&self, address: Address) -> Result<Option<LogEntry>> {
        Ok(self.runtime.log_unit_service().read(address).await?)
    }

    /// Read an address, hole filling it if it stays unwritten
    pub async fn read_or_fill(&self, address: Address) -> Result<LogEntry> {
        let config = self.runtime.config();
        for attempt in 0..=config.hole_fill_retries {
            if let Some(entry) = self.read(address).await? {
                return Ok(entry);
            }
            if attempt < config.hole_fill_retries {
                tokio::time::sleep(config.hole_fill_wait).await;
            }
        }

        match self.fill_hole(address).await {
            Ok(()) => {
                tracing::debug!(%address, "filled abandoned address");
                Ok(LogEntry::new(address, LogData::Hole))
            }
            Err(RuntimeError::Overwrite(_)) => {
                tracing::trace!(%address, "address written while filling hole");
                self.read(address).await?.ok_or_else(|| {
                    RuntimeError::Unavailable(format!("address {address} unreadable after write"))
                })
            }
            Err(e) => Err(e),
        }
    }
}
