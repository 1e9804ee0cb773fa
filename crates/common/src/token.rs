//! Tokens issued by the sequencer

use crate::{Address, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-stream pointer to the previous entry issued to that stream
///
/// `None` means the stream had no prior entry when the token was issued.
pub type Backpointers = HashMap<StreamId, Option<Address>>;

/// Per-stream local offsets handed out alongside a token
///
/// These are informational only. They are kept on retried appends for
/// compatibility with readers that still record them.
pub type StreamAddresses = HashMap<StreamId, u64>;

/// Classification of a token response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// Safe to write at the token's address
    Normal,
    /// A write overlapping the transaction's footprint landed after its snapshot
    TxAbortConflict,
    /// The sequencer changed and cannot vouch for the absence of conflicts
    TxAbortNewSequencer,
}

/// An issued position in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Address of the token; the conflicting address for conflict aborts,
    /// none for new-sequencer aborts
    pub address: Option<Address>,
    /// Sequencer epoch that issued the token
    pub epoch: u64,
}

/// A token plus its classification and per-stream metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub response_type: TokenType,
    pub token: Token,
    pub backpointers: Backpointers,
    pub stream_addresses: StreamAddresses,
}

impl TokenResponse {
    /// A writable token
    pub fn normal(
        address: Address,
        epoch: u64,
        backpointers: Backpointers,
        stream_addresses: StreamAddresses,
    ) -> Self {
        Self {
            response_type: TokenType::Normal,
            token: Token {
                address: Some(address),
                epoch,
            },
            backpointers,
            stream_addresses,
        }
    }

    /// A conflict abort carrying the conflicting address
    pub fn conflict(conflicting: Address, epoch: u64) -> Self {
        Self {
            response_type: TokenType::TxAbortConflict,
            token: Token {
                address: Some(conflicting),
                epoch,
            },
            backpointers: HashMap::new(),
            stream_addresses: HashMap::new(),
        }
    }

    /// A new-sequencer abort; no usable address
    pub fn new_sequencer(epoch: u64) -> Self {
        Self {
            response_type: TokenType::TxAbortNewSequencer,
            token: Token {
                address: None,
                epoch,
            },
            backpointers: HashMap::new(),
            stream_addresses: HashMap::new(),
        }
    }

    /// Only normal responses may be written
    pub fn is_writable(&self) -> bool {
        self.response_type == TokenType::Normal
    }

    pub fn address(&self) -> Option<Address> {
        self.token.address
    }

    /// Backpointer for a stream, none if the stream had no prior entry or
    /// was not part of the request
    pub fn backpointer(&self, stream: StreamId) -> Option<Address> {
        self.backpointers.get(&stream).copied().flatten()
    }

    /// Adopt the ordering metadata of a freshly issued response while keeping
    /// the stream addresses of this (earlier) one
    pub fn reissued(&self, fresh: TokenResponse) -> TokenResponse {
        TokenResponse {
            response_type: fresh.response_type,
            token: fresh.token,
            backpointers: fresh.backpointers,
            stream_addresses: self.stream_addresses.clone(),
        }
    }
}

/// Result of querying the sequencer without reserving an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTails {
    pub epoch: u64,
    /// Last address issued in the whole log
    pub global: Option<Address>,
    /// Last address issued to each requested stream
    pub streams: HashMap<StreamId, Option<Address>>,
}

impl StreamTails {
    pub fn stream(&self, stream: StreamId) -> Option<Address> {
        self.streams.get(&stream).copied().flatten()
    }
}
