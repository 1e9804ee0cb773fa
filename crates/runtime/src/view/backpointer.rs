//! Backpointer walk
//!
//! Starts at the stream's tail as reported by the sequencer and follows each
//! entry's backpointer for the stream. A token that lost its write race
//! leaves a hole (or another stream's entry) on the chain; from there the
//! walk steps back one address at a time until it meets a member again.

use super::AddressLocator;
use crate::{LogRuntime, Result};
use async_trait::async_trait;
use sharedlog_common::{Address, LogEntry, Payload, StreamId, StreamTails};

#[derive(Debug, Clone, Copy, Default)]
pub struct BackpointerLocator;

#[async_trait]
impl AddressLocator for BackpointerLocator {
    async fn locate(
        &self,
        runtime: &LogRuntime,
        stream: StreamId,
        tails: &StreamTails,
        after: Option<Address>,
        up_to: Address,
    ) -> Result<Vec<LogEntry>> {
        let address_space = runtime.address_space();
        let mut found = Vec::new();
        let mut current = tails.stream(stream);

        while let Some(address) = current {
            if Some(address) <= after {
                break;
            }

            // Past the window: only needed to get back into it
            if address > up_to {
                current = match address_space.read(address).await? {
                    Some(entry) if entry.belongs_to(stream) => previous_member(&entry, stream),
                    _ => address.prev(),
                };
                continue;
            }

            let entry = address_space.read_or_fill(address).await?;
            if entry.belongs_to(stream) {
                current = previous_member(&entry, stream);
                found.push(entry);
            } else {
                tracing::trace!(
                    stream = %stream.short(),
                    %address,
                    hole = entry.is_hole(),
                    "backpointer chain broken, scanning back"
                );
                current = address.prev();
            }
        }

        found.reverse();
        Ok(found)
    }
}

/// Where the chain continues below a member entry
fn previous_member(entry: &LogEntry, stream: StreamId) -> Option<Address> {
    // A copy marker is always the first entry of its stream
    match entry.payload() {
        Some(Payload::StreamCopy { .. }) => None,
        _ => entry.backpointer(stream),
    }
}
