//! Objects view and optimistic transactions
//!
//! A transaction reads at the snapshot taken by `tx_begin` and buffers its
//! writes. `tx_end` commits every buffered command as a single record,
//! appended with the transaction's conflict info; the sequencer refuses the
//! token if anything the transaction touched was written after its snapshot.
//!
//! Transactions belong to the task that began them. Other tasks sharing the
//! same objects view, or maps opened from it, keep running outside it.

use crate::map::{MapKey, MapValue};
use crate::record::{SmrRecord, StreamUpdate};
use crate::{ObjectError, Result, SharedMap};
use parking_lot::Mutex;
use sharedlog_common::{Address, ConflictInfo, Footprint, StreamId, TransactionId};
use sharedlog_runtime::LogRuntime;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;
use tokio::task::Id as TaskId;

/// An open transaction
struct TransactionContext {
    conflict: ConflictInfo,
    updates: Vec<StreamUpdate>,
}

/// Owner of a transaction: the tokio task that began it, or the thread
/// when called outside any task (for example under `block_on`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scope {
    Task(TaskId),
    Thread(ThreadId),
}

impl Scope {
    fn current() -> Self {
        match tokio::task::try_id() {
            Some(id) => Scope::Task(id),
            None => Scope::Thread(std::thread::current().id()),
        }
    }
}

/// Identity of the transaction a map operation runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActiveTransaction {
    pub id: TransactionId,
    pub snapshot: Option<Address>,
}

/// Per-client entry point to replicated objects
///
/// Clones share the open transactions, one per task.
#[derive(Clone)]
pub struct ObjectsView {
    runtime: LogRuntime,
    transactions: Arc<Mutex<HashMap<Scope, TransactionContext>>>,
}

impl ObjectsView {
    pub fn new(runtime: LogRuntime) -> Self {
        Self {
            runtime,
            transactions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn runtime(&self) -> &LogRuntime {
        &self.runtime
    }

    /// Open a map bound to `stream`
    pub async fn open_map<K: MapKey, V: MapValue>(&self, stream: StreamId) -> Result<SharedMap<K, V>> {
        SharedMap::open(self.clone(), stream).await
    }

    /// Start a transaction in the calling task, reading at the current tail
    pub async fn tx_begin(&self) -> Result<TransactionId> {
        if self.tx_active() {
            return Err(ObjectError::InvalidState(
                "transaction already active".to_string(),
            ));
        }

        let snapshot = self.runtime.sequencer().tail().await?;
        let id = TransactionId::new();

        let mut transactions = self.transactions.lock();
        if transactions.contains_key(&Scope::current()) {
            return Err(ObjectError::InvalidState(
                "transaction already active".to_string(),
            ));
        }
        transactions.insert(
            Scope::current(),
            TransactionContext {
                conflict: ConflictInfo::new(id, snapshot),
                updates: Vec::new(),
            },
        );
        tracing::debug!(txn = %id, ?snapshot, "transaction started");
        Ok(id)
    }

    /// Commit the calling task's transaction
    ///
    /// Returns the commit address, or none for a transaction that wrote
    /// nothing. On abort the buffered writes are discarded and the error
    /// carries the cause.
    pub async fn tx_end(&self) -> Result<Option<Address>> {
        let context = self
            .transactions
            .lock()
            .remove(&Scope::current())
            .ok_or_else(|| ObjectError::InvalidState("no active transaction".to_string()))?;

        let id = context.conflict.transaction_id;
        if context.updates.is_empty() {
            tracing::debug!(txn = %id, "read-only transaction committed");
            return Ok(None);
        }

        let streams = context.conflict.written_streams();
        let record = SmrRecord {
            updates: context.updates,
        }
        .encode()?;

        match self
            .runtime
            .streams()
            .append(&streams, record, Some(context.conflict))
            .await
        {
            Ok(address) => {
                tracing::debug!(txn = %id, %address, "transaction committed");
                Ok(Some(address))
            }
            Err(e) if e.is_abort() => {
                tracing::debug!(txn = %id, "transaction aborted: {}", e);
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!(txn = %id, "transaction commit failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Discard the calling task's transaction
    pub fn tx_abort(&self) -> Result<()> {
        match self.transactions.lock().remove(&Scope::current()) {
            Some(context) => {
                tracing::debug!(txn = %context.conflict.transaction_id, "transaction abandoned");
                Ok(())
            }
            None => Err(ObjectError::InvalidState(
                "no active transaction".to_string(),
            )),
        }
    }

    /// Whether the calling task has a transaction open
    pub fn tx_active(&self) -> bool {
        self.transactions.lock().contains_key(&Scope::current())
    }

    pub(crate) fn active_transaction(&self) -> Option<ActiveTransaction> {
        self.transactions
            .lock()
            .get(&Scope::current())
            .map(|context| ActiveTransaction {
                id: context.conflict.transaction_id,
                snapshot: context.conflict.snapshot,
            })
    }

    /// Whether transaction `id` is still open in any task
    pub(crate) fn is_open(&self, id: TransactionId) -> bool {
        self.transactions
            .lock()
            .values()
            .any(|context| context.conflict.transaction_id == id)
    }

    pub(crate) fn record_read(&self, stream: StreamId, footprint: Footprint) {
        if let Some(context) = self.transactions.lock().get_mut(&Scope::current()) {
            context.conflict.record_read(stream, footprint);
        }
    }

    /// Buffer a command of the active transaction
    pub(crate) fn record_write(&self, stream: StreamId, footprint: Footprint, command: Vec<u8>) {
        if let Some(context) = self.transactions.lock().get_mut(&Scope::current()) {
            context.conflict.record_write(stream, footprint);
            context.updates.push(StreamUpdate { stream, command });
        }
    }
}
