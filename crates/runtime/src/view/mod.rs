//! Stream views
//!
//! A stream view reconstructs one stream's entries, in address order, from
//! the interleaved log. Views are cursors: they resolve entries on demand,
//! remember the last address they handed out and can be rewound to any
//! position they have reported.
//!
//! How a view finds the addresses of its stream depends on the replication
//! mode: chain and quorum replicated logs are walked through backpointers,
//! Replex logs keep a per-stream index on the log units. Both feed the same
//! cursor, which also splices in the history of the stream a clone was
//! copied from.

mod backpointer;
mod stream_index;

pub use backpointer::BackpointerLocator;
pub use stream_index::StreamIndexLocator;

use crate::{LogRuntime, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use sharedlog_common::{Address, LogEntry, Payload, StreamId, StreamTails};
use std::collections::{BTreeSet, VecDeque};
use tokio_stream::Stream;

/// Reads one stream of the shared log
#[async_trait]
pub trait StreamView: Send {
    fn id(&self) -> StreamId;

    /// Address of the last entry returned, none before the first
    fn position(&self) -> Option<Address>;

    /// Continue after `position`; none restarts from the beginning
    fn seek(&mut self, position: Option<Address>);

    /// This stream plus every stream its history was copied from
    fn lineage(&self) -> &BTreeSet<StreamId>;

    /// Next entry, if the stream has one
    async fn next(&mut self) -> Result<Option<LogEntry>>;

    /// Next entry at or below `max`
    async fn next_up_to(&mut self, max: Address) -> Result<Option<LogEntry>>;

    /// All entries after the position, up to `max`
    async fn remaining_up_to(&mut self, max: Address) -> Result<Vec<LogEntry>>;

    /// All entries after the position, up to the current tail
    async fn remaining(&mut self) -> Result<Vec<LogEntry>>;
}

/// Finds the member entries of a stream inside an address window
#[async_trait]
pub trait AddressLocator: Send + Sync {
    /// Member entries of `stream` in `(after, up_to]`, ascending
    ///
    /// Copy markers are returned as they are. Unwritten addresses the
    /// stream may own are resolved, so nothing can later land inside the
    /// window.
    async fn locate(
        &self,
        runtime: &LogRuntime,
        stream: StreamId,
        tails: &StreamTails,
        after: Option<Address>,
        up_to: Address,
    ) -> Result<Vec<LogEntry>>;
}

/// Stream view reading through backpointers
pub type BackpointerStreamView = StreamCursor<BackpointerLocator>;

/// Stream view reading through the log units' stream index
pub type StreamIndexView = StreamCursor<StreamIndexLocator>;

/// Cursor over one stream
pub struct StreamCursor<L> {
    runtime: LogRuntime,
    id: StreamId,
    locator: L,
    /// Last returned address
    position: Option<Address>,
    /// Own-stream addresses are resolved up to here
    resolved: Option<Address>,
    buffer: VecDeque<LogEntry>,
    lineage: BTreeSet<StreamId>,
}

impl<L: AddressLocator> StreamCursor<L> {
    pub fn new(runtime: LogRuntime, id: StreamId, locator: L) -> Self {
        Self {
            runtime,
            id,
            locator,
            position: None,
            resolved: None,
            buffer: VecDeque::new(),
            lineage: BTreeSet::from([id]),
        }
    }

    /// Resolve entries up to `max` (or the current tail) into the buffer
    async fn fill(&mut self, max: Option<Address>) -> Result<()> {
        let tails = self
            .runtime
            .sequencer()
            .query(&BTreeSet::from([self.id]))
            .await?;
        let Some(global) = tails.global else {
            return Ok(());
        };
        let up_to = max.map_or(global, |max| max.min(global));
        if Some(up_to) <= self.resolved {
            return Ok(());
        }

        let after = self.resolved;
        let found = self
            .locator
            .locate(&self.runtime, self.id, &tails, after, up_to)
            .await?;
        let entries = splice(
            &self.locator,
            &self.runtime,
            self.id,
            found,
            after,
            &mut self.lineage,
        )
        .await?;

        tracing::trace!(
            stream = %self.id.short(),
            ?after,
            %up_to,
            found = entries.len(),
            "stream view advanced"
        );
        self.buffer.extend(entries);
        self.resolved = Some(up_to);
        Ok(())
    }

    fn pop_up_to(&mut self, max: Option<Address>) -> Option<LogEntry> {
        let front = self.buffer.front()?;
        if max.is_some_and(|max| front.address > max) {
            return None;
        }
        let entry = self.buffer.pop_front()?;
        self.position = Some(entry.address);
        Some(entry)
    }

    async fn next_within(&mut self, max: Option<Address>) -> Result<Option<LogEntry>> {
        if self.buffer.is_empty() {
            self.fill(max).await?;
        }
        Ok(self.pop_up_to(max))
    }

    async fn drain_within(&mut self, max: Option<Address>) -> Result<Vec<LogEntry>> {
        self.fill(max).await?;
        let mut entries = Vec::with_capacity(self.buffer.len());
        while let Some(entry) = self.pop_up_to(max) {
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait]
impl<L: AddressLocator> StreamView for StreamCursor<L> {
    fn id(&self) -> StreamId {
        self.id
    }

    fn position(&self) -> Option<Address> {
        self.position
    }

    fn seek(&mut self, position: Option<Address>) {
        self.position = position;
        self.resolved = position;
        self.buffer.clear();
    }

    fn lineage(&self) -> &BTreeSet<StreamId> {
        &self.lineage
    }

    async fn next(&mut self) -> Result<Option<LogEntry>> {
        self.next_within(None).await
    }

    async fn next_up_to(&mut self, max: Address) -> Result<Option<LogEntry>> {
        self.next_within(Some(max)).await
    }

    async fn remaining_up_to(&mut self, max: Address) -> Result<Vec<LogEntry>> {
        self.drain_within(Some(max)).await
    }

    async fn remaining(&mut self) -> Result<Vec<LogEntry>> {
        self.drain_within(None).await
    }
}

/// Replace copy markers with the source stream's history
///
/// A marker `(source, t)` at `m` stands for the source's entries in
/// `(after, min(t, m)]`. Sources may be clones themselves. A marker naming
/// `stream`, the stream it was found in, has no history to contribute and
/// is dropped.
fn splice<'a, L: AddressLocator>(
    locator: &'a L,
    runtime: &'a LogRuntime,
    stream: StreamId,
    entries: Vec<LogEntry>,
    after: Option<Address>,
    lineage: &'a mut BTreeSet<StreamId>,
) -> BoxFuture<'a, Result<Vec<LogEntry>>> {
    async move {
        let mut spliced = Vec::with_capacity(entries.len());
        for entry in entries {
            let marker = match entry.payload() {
                Some(Payload::StreamCopy { source, timestamp }) => Some((*source, *timestamp)),
                _ => None,
            };
            let Some((source, timestamp)) = marker else {
                spliced.push(entry);
                continue;
            };

            if source == stream {
                tracing::warn!(
                    stream = %stream.short(),
                    address = %entry.address,
                    "ignoring copy marker naming its own stream"
                );
                continue;
            }

            lineage.insert(source);
            let up_to = timestamp.min(entry.address);
            if Some(up_to) <= after {
                continue;
            }

            let tails = runtime.sequencer().query(&BTreeSet::from([source])).await?;
            let history = locator.locate(runtime, source, &tails, after, up_to).await?;
            spliced.extend(splice(locator, runtime, source, history, after, &mut *lineage).await?);
        }
        Ok(spliced)
    }
    .boxed()
}

/// Entries of a view as an async stream
pub fn entries(mut view: Box<dyn StreamView>) -> impl Stream<Item = Result<LogEntry>> + Send {
    async_stream::try_stream! {
        while let Some(entry) = view.next().await? {
            yield entry;
        }
    }
}
