//! Log records of replicated objects
//!
//! Every entry written by the object layer holds one [`SmrRecord`]: a list of
//! commands, each addressed to the stream of the object it mutates. A
//! transaction touching several objects commits all their commands in one
//! record.

use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sharedlog_common::StreamId;
use std::collections::BTreeSet;

/// A serialized command for the object bound to `stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub stream: StreamId,
    pub command: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmrRecord {
    pub updates: Vec<StreamUpdate>,
}

impl SmrRecord {
    pub fn single(stream: StreamId, command: Vec<u8>) -> Self {
        Self {
            updates: vec![StreamUpdate { stream, command }],
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Commands addressed to any of `streams`, in record order
    pub fn commands_for<'a>(
        &'a self,
        streams: &'a BTreeSet<StreamId>,
    ) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.updates
            .iter()
            .filter(|update| streams.contains(&update.stream))
            .map(|update| update.command.as_slice())
    }
}

/// Mutations of a [`SharedMap`](crate::SharedMap)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapCommand<K, V> {
    Put { key: K, value: V },
    Remove { key: K },
    Clear,
}

impl<K: Serialize, V: Serialize> MapCommand<K, V> {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<K: DeserializeOwned, V: DeserializeOwned> MapCommand<K, V> {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
