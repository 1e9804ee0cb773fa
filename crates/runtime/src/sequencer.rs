//! Sequencer client

use crate::{LogRuntime, Result, RuntimeError};
use sharedlog_common::{
    AbortCause, Address, ConflictInfo, StreamId, StreamTails, TokenResponse, TokenType,
};
use std::collections::BTreeSet;

/// Requests tokens and tails from the sequencer
#[derive(Clone)]
pub struct SequencerView {
    runtime: LogRuntime,
}

impl SequencerView {
    pub(crate) fn new(runtime: LogRuntime) -> Self {
        Self { runtime }
    }

    /// Reserve `count` addresses for `streams`; always a normal response
    pub async fn next_token(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
    ) -> Result<TokenResponse> {
        Ok(self
            .runtime
            .sequencer_service()
            .next_token(streams, count, None)
            .await?)
    }

    /// Reserve addresses for a transaction; the response may be an abort
    pub async fn next_token_with_conflicts(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: &ConflictInfo,
    ) -> Result<TokenResponse> {
        Ok(self
            .runtime
            .sequencer_service()
            .next_token(streams, count, Some(conflict))
            .await?)
    }

    /// Request a token with or without conflict info
    pub(crate) async fn request(
        &self,
        streams: &BTreeSet<StreamId>,
        conflict: Option<&ConflictInfo>,
    ) -> Result<TokenResponse> {
        match conflict {
            Some(conflict) => self.next_token_with_conflicts(streams, 1, conflict).await,
            None => self.next_token(streams, 1).await,
        }
    }

    /// Current tails; reserves nothing
    pub async fn query(&self, streams: &BTreeSet<StreamId>) -> Result<StreamTails> {
        Ok(self.runtime.sequencer_service().query(streams).await?)
    }

    /// Last address issued in the whole log
    pub async fn tail(&self) -> Result<Option<Address>> {
        Ok(self.query(&BTreeSet::new()).await?.global)
    }

    /// Map abort responses to [`RuntimeError::TransactionAborted`]
    pub fn classify(response: &TokenResponse) -> Result<()> {
        match response.response_type {
            TokenType::Normal => Ok(()),
            TokenType::TxAbortConflict => Err(RuntimeError::TransactionAborted {
                cause: AbortCause::Conflict,
                address: response.address(),
            }),
            TokenType::TxAbortNewSequencer => Err(RuntimeError::TransactionAborted {
                cause: AbortCause::NewSequencer,
                address: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_classify() {
        let normal = TokenResponse::normal(Address::new(3), 0, HashMap::new(), HashMap::new());
        assert!(SequencerView::classify(&normal).is_ok());

        assert_eq!(
            SequencerView::classify(&TokenResponse::conflict(Address::new(7), 0)),
            Err(RuntimeError::TransactionAborted {
                cause: AbortCause::Conflict,
                address: Some(Address::new(7)),
            })
        );
        assert_eq!(
            SequencerView::classify(&TokenResponse::new_sequencer(2)),
            Err(RuntimeError::TransactionAborted {
                cause: AbortCause::NewSequencer,
                address: None,
            })
        );
    }
}
