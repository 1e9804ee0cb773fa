//! Appends, stream copies and stream views
//!
//! Appending takes a token from the sequencer and writes the payload at its
//! address. Losing the write race to a reader that hole-filled the address
//! is not an error: the append asks for a new token and tries again. For a
//! transaction the snapshot moves up to the lost address first, since the
//! sequencer already vouched for everything up to there.

use crate::view::{BackpointerLocator, StreamCursor, StreamIndexLocator, StreamView};
use crate::{LogRuntime, Result, RuntimeError, SequencerView};
use sharedlog_common::{Address, ConflictInfo, Payload, ReplicationMode, StreamId, TokenResponse};
use std::collections::BTreeSet;

/// One attempt of an append: the conflict info it was requested with and
/// the sequencer's answer
struct AppendAttempt {
    conflict: Option<ConflictInfo>,
    response: TokenResponse,
}

impl AppendAttempt {
    /// Next attempt after losing `contested`
    ///
    /// The fresh response's type, token and backpointers replace ours; the
    /// stream addresses of the first attempt are kept.
    async fn retry(
        &self,
        sequencer: &SequencerView,
        streams: &BTreeSet<StreamId>,
        contested: Address,
    ) -> Result<AppendAttempt> {
        let conflict = self
            .conflict
            .as_ref()
            .map(|conflict| conflict.with_snapshot(Some(contested)));
        let fresh = sequencer.request(streams, conflict.as_ref()).await?;
        Ok(AppendAttempt {
            conflict,
            response: self.response.reissued(fresh),
        })
    }
}

#[derive(Clone)]
pub struct MultiStreamView {
    runtime: LogRuntime,
}

impl MultiStreamView {
    pub(crate) fn new(runtime: LogRuntime) -> Self {
        Self { runtime }
    }

    /// Open a view on `stream`, reading the way the active layout requires
    pub async fn open(&self, stream: StreamId) -> Result<Box<dyn StreamView>> {
        let layout = self.runtime.layout().await?;
        Ok(match layout.replication_mode() {
            ReplicationMode::ChainReplication | ReplicationMode::QuorumReplication => Box::new(
                StreamCursor::new(self.runtime.clone(), stream, BackpointerLocator),
            ),
            ReplicationMode::Replex => Box::new(StreamCursor::new(
                self.runtime.clone(),
                stream,
                StreamIndexLocator,
            )),
        })
    }

    /// Append `payload` to every stream in `streams`
    ///
    /// Returns the address the entry landed at. With conflict info this is
    /// the commit of a transaction and may fail with
    /// [`RuntimeError::TransactionAborted`].
    pub async fn append(
        &self,
        streams: &BTreeSet<StreamId>,
        payload: Vec<u8>,
        conflict: Option<ConflictInfo>,
    ) -> Result<Address> {
        if streams.is_empty() {
            return Err(RuntimeError::InvalidRequest(
                "append needs at least one stream".to_string(),
            ));
        }

        let sequencer = self.runtime.sequencer();
        let address_space = self.runtime.address_space();

        let response = sequencer.request(streams, conflict.as_ref()).await?;
        let mut attempt = AppendAttempt { conflict, response };

        loop {
            if let Err(e) = SequencerView::classify(&attempt.response) {
                if let Some(conflict) = &attempt.conflict {
                    tracing::debug!(
                        txn = %conflict.transaction_id,
                        snapshot = ?conflict.snapshot,
                        "append aborted: {}",
                        e
                    );
                }
                return Err(e);
            }

            match address_space
                .write(&attempt.response, Payload::Data(payload.clone()))
                .await
            {
                Ok(address) => return Ok(address),
                Err(RuntimeError::Overwrite(contested)) => {
                    tracing::debug!(%contested, "append lost write race, retrying");
                    attempt = attempt.retry(&sequencer, streams, contested).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make `destination` a copy of `source` as of `timestamp`
    ///
    /// Writes a single marker entry; the source's history is spliced in by
    /// readers. Fails with [`RuntimeError::DestinationExists`] if the
    /// destination already has entries.
    pub async fn copy(
        &self,
        source: StreamId,
        destination: StreamId,
        timestamp: Address,
    ) -> Result<Box<dyn StreamView>> {
        if source == destination {
            return Err(RuntimeError::InvalidRequest(format!(
                "cannot copy stream {} onto itself",
                source.short()
            )));
        }

        let sequencer = self.runtime.sequencer();
        let address_space = self.runtime.address_space();
        let streams = BTreeSet::from([destination]);
        let marker = Payload::StreamCopy { source, timestamp };

        // Addresses of our own tokens that lost their race
        let mut lost = Vec::new();

        loop {
            let response = sequencer.next_token(&streams, 1).await?;
            SequencerView::classify(&response)?;

            if let Some(previous) = response.backpointer(destination)
                && !lost.contains(&previous)
            {
                if let Some(claimed) = response.address() {
                    address_space.fill_hole_if_unwritten(claimed).await?;
                }
                tracing::debug!(
                    destination = %destination.short(),
                    %previous,
                    "copy refused: destination has entries"
                );
                return Err(RuntimeError::DestinationExists(destination));
            }

            match address_space.write(&response, marker.clone()).await {
                Ok(address) => {
                    tracing::debug!(
                        source = %source.short(),
                        destination = %destination.short(),
                        %timestamp,
                        %address,
                        "stream copied"
                    );
                    return self.open(destination).await;
                }
                Err(RuntimeError::Overwrite(contested)) => {
                    tracing::debug!(%contested, "copy lost write race, retrying");
                    lost.push(contested);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
