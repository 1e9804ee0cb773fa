//! Replicated map
//!
//! The map's state is the result of applying, in log order, every command
//! addressed to its stream (or to a stream it was copied from). Mutations
//! outside a transaction are appended right away; inside a transaction they
//! are buffered in the objects view and applied to a private copy of the
//! map taken at the transaction's snapshot.

use crate::objects::ActiveTransaction;
use crate::record::{MapCommand, SmrRecord};
use crate::{ObjectError, ObjectsView, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sharedlog_common::{Address, Footprint, LogEntry, StreamId, TransactionId};
use sharedlog_runtime::StreamView;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Requirements on map keys
pub trait MapKey: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> MapKey for T where T: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync + 'static {}

/// Requirements on map values
pub trait MapValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> MapValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

struct MapState<K, V> {
    view: Box<dyn StreamView>,
    entries: HashMap<K, V>,

    /// Mutations appended but not yet returned to their caller
    inflight: usize,

    /// Value replaced by the entry at each address, kept while mutations
    /// are in flight
    upcalls: HashMap<Address, Option<V>>,

    /// Private copies for the transactions working on this map
    transactions: HashMap<TransactionId, HashMap<K, V>>,
}

impl<K: MapKey, V: MapValue> MapState<K, V> {
    /// Apply entries up to `max`, or up to the tail
    async fn sync(&mut self, max: Option<Address>) -> Result<()> {
        let entries = match max {
            Some(max) => self.view.remaining_up_to(max).await?,
            None => self.view.remaining().await?,
        };

        for entry in entries {
            let previous = apply(&mut self.entries, &entry, self.view.lineage())?;
            if self.inflight > 0 {
                self.upcalls.insert(entry.address, previous);
            }
        }
        Ok(())
    }

    /// Settle one in-flight mutation, returning the value its entry replaced
    fn finish(&mut self, address: Option<Address>) -> Option<V> {
        let previous = address
            .and_then(|address| self.upcalls.remove(&address))
            .flatten();
        self.inflight = self.inflight.saturating_sub(1);
        if self.inflight == 0 {
            self.upcalls.clear();
        }
        previous
    }
}

/// Apply a log entry's commands for `lineage`; returns the value replaced
/// by the last one
fn apply<K: MapKey, V: MapValue>(
    entries: &mut HashMap<K, V>,
    entry: &LogEntry,
    lineage: &BTreeSet<StreamId>,
) -> Result<Option<V>> {
    let Some(bytes) = entry.data_bytes() else {
        return Ok(None);
    };

    let record = SmrRecord::decode(bytes)?;
    let mut previous = None;
    for command in record.commands_for(lineage) {
        previous = apply_command(entries, MapCommand::decode(command)?);
    }
    Ok(previous)
}

fn apply_command<K: MapKey, V: MapValue>(
    entries: &mut HashMap<K, V>,
    command: MapCommand<K, V>,
) -> Option<V> {
    match command {
        MapCommand::Put { key, value } => entries.insert(key, value),
        MapCommand::Remove { key } => entries.remove(&key),
        MapCommand::Clear => {
            entries.clear();
            None
        }
    }
}

fn conflict_key<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(key)?)
}

/// Map replicated through one stream of the shared log
pub struct SharedMap<K, V> {
    stream: StreamId,
    objects: ObjectsView,
    state: Arc<AsyncMutex<MapState<K, V>>>,
}

impl<K, V> Clone for SharedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream,
            objects: self.objects.clone(),
            state: self.state.clone(),
        }
    }
}

impl<K: MapKey, V: MapValue> SharedMap<K, V> {
    pub(crate) async fn open(objects: ObjectsView, stream: StreamId) -> Result<Self> {
        let view = objects.runtime().streams().open(stream).await?;
        Ok(Self {
            stream,
            objects,
            state: Arc::new(AsyncMutex::new(MapState {
                view,
                entries: HashMap::new(),
                inflight: 0,
                upcalls: HashMap::new(),
                transactions: HashMap::new(),
            })),
        })
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let footprint = Footprint::key(conflict_key(key)?);
        self.read(footprint, |entries| entries.get(key).cloned())
            .await
    }

    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        let footprint = Footprint::key(conflict_key(key)?);
        self.read(footprint, |entries| entries.contains_key(key))
            .await
    }

    pub async fn len(&self) -> Result<usize> {
        self.read(Footprint::Stream, |entries| entries.len()).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.read(Footprint::Stream, |entries| entries.is_empty())
            .await
    }

    /// Snapshot of all entries, in no particular order
    pub async fn entries(&self) -> Result<Vec<(K, V)>> {
        self.read(Footprint::Stream, |entries| {
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .await
    }

    /// Insert `value`, returning the value it replaced
    pub async fn put(&self, key: K, value: V) -> Result<Option<V>> {
        let footprint = Footprint::key(conflict_key(&key)?);
        self.mutate(MapCommand::Put { key, value }, footprint).await
    }

    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        let footprint = Footprint::key(conflict_key(key)?);
        self.mutate(
            MapCommand::Remove { key: key.clone() },
            footprint,
        )
        .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.mutate(MapCommand::Clear, Footprint::Stream).await?;
        Ok(())
    }

    async fn read<R>(
        &self,
        footprint: Footprint,
        f: impl FnOnce(&HashMap<K, V>) -> R + Send,
    ) -> Result<R> {
        let mut state = self.state.lock().await;
        match self.objects.active_transaction() {
            Some(transaction) => {
                self.objects.record_read(self.stream, footprint);
                let entries = self.transaction_entries(&mut state, transaction).await?;
                Ok(f(entries))
            }
            None => {
                state.sync(None).await?;
                Ok(f(&state.entries))
            }
        }
    }

    async fn mutate(&self, command: MapCommand<K, V>, footprint: Footprint) -> Result<Option<V>> {
        let encoded = command.encode()?;

        let Some(transaction) = self.objects.active_transaction() else {
            return self.append(encoded).await;
        };

        let mut state = self.state.lock().await;
        let entries = self.transaction_entries(&mut state, transaction).await?;
        let previous = apply_command(entries, command);
        // Mutators report the replaced value, so they read what they write
        self.objects.record_read(self.stream, footprint.clone());
        self.objects.record_write(self.stream, footprint, encoded);
        Ok(previous)
    }

    /// Append a command and wait for it to be applied
    async fn append(&self, command: Vec<u8>) -> Result<Option<V>> {
        let record = SmrRecord::single(self.stream, command).encode()?;
        self.state.lock().await.inflight += 1;

        let appended = self
            .objects
            .runtime()
            .streams()
            .append(&BTreeSet::from([self.stream]), record, None)
            .await;

        let mut state = self.state.lock().await;
        let applied = match appended {
            Ok(address) => state.sync(Some(address)).await.map(|()| address),
            Err(e) => Err(e.into()),
        };
        let previous = state.finish(applied.as_ref().ok().copied());
        applied.map(|_| previous)
    }

    /// The transaction's private copy of the map, built on first use
    async fn transaction_entries<'s>(
        &self,
        state: &'s mut MapState<K, V>,
        transaction: ActiveTransaction,
    ) -> Result<&'s mut HashMap<K, V>> {
        if !state.transactions.contains_key(&transaction.id) {
            let objects = &self.objects;
            state.transactions.retain(|id, _| objects.is_open(*id));
            let entries = self.at_snapshot(state, transaction.snapshot).await?;
            state.transactions.insert(transaction.id, entries);
        }
        state
            .transactions
            .get_mut(&transaction.id)
            .ok_or_else(|| ObjectError::InvalidState("transaction state missing".to_string()))
    }

    /// The map as of `snapshot`
    ///
    /// Taken from the synced state when that has not moved past the
    /// snapshot, otherwise replayed from a fresh view.
    async fn at_snapshot(
        &self,
        state: &mut MapState<K, V>,
        snapshot: Option<Address>,
    ) -> Result<HashMap<K, V>> {
        let Some(snapshot) = snapshot else {
            return Ok(HashMap::new());
        };

        if state.view.position() <= Some(snapshot) {
            state.sync(Some(snapshot)).await?;
            return Ok(state.entries.clone());
        }

        tracing::trace!(
            stream = %self.stream.short(),
            %snapshot,
            "replaying map for transaction snapshot"
        );
        let mut entries = HashMap::new();
        let mut view = self.objects.runtime().streams().open(self.stream).await?;
        for entry in view.remaining_up_to(snapshot).await? {
            apply(&mut entries, &entry, view.lineage())?;
        }
        Ok(entries)
    }
}
