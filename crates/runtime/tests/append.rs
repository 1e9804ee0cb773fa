//! Append path: token issue, write races and transactional commits

mod common;

use common::{racing_runtime, runtime, streams};
use sharedlog_common::{
    AbortCause, Address, ConflictInfo, Footprint, LogData, StreamId, TransactionId,
};
use sharedlog_engine::MockEngine;
use sharedlog_runtime::RuntimeError;
use std::collections::BTreeSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_distinct_and_gap_free() {
    let engine = MockEngine::new();
    let runtime = runtime(&engine);
    let mut tasks = tokio::task::JoinSet::new();

    for writer in 0..5 {
        let streams = runtime.streams();
        tasks.spawn(async move {
            let targets = BTreeSet::from([
                StreamId::from_name(&format!("writer-{writer}")),
                StreamId::from_name("shared"),
            ]);
            let mut addresses = Vec::new();
            for i in 0..200 {
                let payload = format!("{writer}:{i}").into_bytes();
                addresses.push(streams.append(&targets, payload, None).await.unwrap());
            }
            addresses
        });
    }

    let mut all = BTreeSet::new();
    while let Some(addresses) = tasks.join_next().await {
        let addresses = addresses.unwrap();
        // Each writer sees its own appends in order
        assert!(addresses.windows(2).all(|pair| pair[0] < pair[1]));
        for address in addresses {
            assert!(all.insert(address));
        }
    }

    assert_eq!(all.len(), 1000);
    let tail = runtime.sequencer().tail().await.unwrap().unwrap();
    assert_eq!(tail, Address::new(999));
    for value in 0..=tail.value() {
        assert!(engine.log_unit.get(Address::new(value)).is_some());
    }
}

#[tokio::test]
async fn test_lost_race_is_retried() {
    let engine = MockEngine::new();
    let (runtime, _) = racing_runtime(&engine, 2);
    let a = StreamId::from_name("a");

    let address = runtime
        .streams()
        .append(&BTreeSet::from([a]), b"v".to_vec(), None)
        .await
        .unwrap();

    assert_eq!(address, Address::new(2));
    assert_eq!(engine.log_unit.get(Address::new(0)), Some(LogData::Hole));
    assert_eq!(engine.log_unit.get(Address::new(1)), Some(LogData::Hole));

    let Some(LogData::Data(entry)) = engine.log_unit.get(address) else {
        panic!("expected data at {address}");
    };
    // Ordering metadata from the last token, stream addresses from the first
    assert_eq!(entry.backpointers[&a], Some(Address::new(1)));
    assert_eq!(entry.stream_addresses[&a], 0);
}

#[tokio::test]
async fn test_snapshot_advances_after_each_lost_race() {
    let engine = MockEngine::new();
    let (runtime, recorder) = racing_runtime(&engine, 3);
    let a = StreamId::from_name("a");

    let mut conflict = ConflictInfo::new(TransactionId::new(), None);
    conflict.record_read(a, Footprint::key(b"k".to_vec()));
    conflict.record_write(a, Footprint::key(b"k".to_vec()));

    let address = runtime
        .streams()
        .append(&BTreeSet::from([a]), b"v".to_vec(), Some(conflict))
        .await
        .unwrap();
    assert_eq!(address, Address::new(3));

    let snapshots = recorder.snapshots();
    assert_eq!(
        snapshots,
        vec![
            None,
            Some(Address::new(0)),
            Some(Address::new(1)),
            Some(Address::new(2)),
        ]
    );
    assert!(snapshots.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_conflicting_write_aborts_commit() {
    let engine = MockEngine::new();
    let runtime = runtime(&engine);
    let a = StreamId::from_name("a");

    let snapshot = runtime.sequencer().tail().await.unwrap();
    let mut conflict = ConflictInfo::new(TransactionId::new(), snapshot);
    conflict.record_read(a, Footprint::key(b"k".to_vec()));
    conflict.record_write(a, Footprint::key(b"k".to_vec()));

    let racer = runtime
        .streams()
        .append(&BTreeSet::from([a]), b"other".to_vec(), None)
        .await
        .unwrap();

    let result = runtime
        .streams()
        .append(&BTreeSet::from([a]), b"mine".to_vec(), Some(conflict))
        .await;
    assert_eq!(
        result,
        Err(RuntimeError::TransactionAborted {
            cause: AbortCause::Conflict,
            address: Some(racer),
        })
    );
    assert_eq!(engine.log_unit.len(), 1);
}

#[tokio::test]
async fn test_disjoint_keys_commit() {
    let engine = MockEngine::new();
    let runtime = runtime(&engine);
    let a = StreamId::from_name("a");

    let snapshot = runtime.sequencer().tail().await.unwrap();
    let mut first = ConflictInfo::new(TransactionId::new(), snapshot);
    first.record_write(a, Footprint::key(b"x".to_vec()));
    let mut second = ConflictInfo::new(TransactionId::new(), snapshot);
    second.record_read(a, Footprint::key(b"y".to_vec()));
    second.record_write(a, Footprint::key(b"y".to_vec()));

    let streams = runtime.streams();
    streams
        .append(&BTreeSet::from([a]), b"x".to_vec(), Some(first))
        .await
        .unwrap();
    streams
        .append(&BTreeSet::from([a]), b"y".to_vec(), Some(second))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_new_sequencer_aborts_old_snapshot() {
    let engine = MockEngine::new();
    let runtime = runtime(&engine);
    let a = StreamId::from_name("a");

    runtime
        .streams()
        .append(&streams(&["a"]), b"v".to_vec(), None)
        .await
        .unwrap();
    runtime
        .streams()
        .append(&streams(&["a"]), b"w".to_vec(), None)
        .await
        .unwrap();

    let mut conflict = ConflictInfo::new(TransactionId::new(), Some(Address::new(0)));
    conflict.record_write(a, Footprint::key(b"k".to_vec()));

    engine.sequencer.fail_over();

    let result = runtime
        .streams()
        .append(&streams(&["a"]), b"x".to_vec(), Some(conflict))
        .await;
    assert_eq!(
        result,
        Err(RuntimeError::TransactionAborted {
            cause: AbortCause::NewSequencer,
            address: None,
        })
    );
}

#[tokio::test]
async fn test_invalid_requests() {
    let engine = MockEngine::new();
    let runtime = runtime(&engine);

    assert!(matches!(
        runtime.streams().append(&BTreeSet::new(), Vec::new(), None).await,
        Err(RuntimeError::InvalidRequest(_))
    ));
    assert!(matches!(
        runtime.sequencer().next_token(&streams(&["a"]), 0).await,
        Err(RuntimeError::InvalidRequest(_))
    ));
    assert_eq!(runtime.sequencer().tail().await.unwrap(), None);
}
