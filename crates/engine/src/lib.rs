//! In-memory services for testing the shared log client
//!
//! This crate provides single-process implementations of the sequencer, log
//! unit and layout service contracts from `sharedlog-common`, so the client
//! core can be exercised without a cluster.

mod engine;
mod layout;
mod log_unit;
mod sequencer;

pub use engine::MockEngine;
pub use layout::MockLayout;
pub use log_unit::MockLogUnit;
pub use sequencer::MockSequencer;

#[cfg(test)]
mod tests {
    use super::*;
    use sharedlog_common::{
        DataEntry, LayoutService, LogUnitService, Payload, ReplicationMode, SequencerService,
        StreamId,
    };
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_token_then_write() {
        let engine = MockEngine::new();
        let a = StreamId::from_name("a");
        let streams = BTreeSet::from([a]);

        let token = engine.sequencer.next_token(&streams, 1, None).await.unwrap();
        let address = token.address().unwrap();
        engine
            .log_unit
            .write(
                address,
                DataEntry {
                    streams: streams.clone(),
                    backpointers: token.backpointers.clone(),
                    stream_addresses: HashMap::new(),
                    payload: Payload::Data(b"hello".to_vec()),
                },
            )
            .await
            .unwrap();

        let entry = engine.log_unit.read(address).await.unwrap().unwrap();
        assert!(entry.belongs_to(a));
        assert_eq!(entry.data_bytes(), Some(&b"hello"[..]));

        let tails = engine.sequencer.query(&streams).await.unwrap();
        assert_eq!(tails.stream(a), Some(address));
    }

    #[tokio::test]
    async fn test_concurrent_tokens_are_distinct() {
        let engine = MockEngine::new();
        let sequencer: Arc<dyn SequencerService> = engine.sequencer.clone();
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..8 {
            let sequencer = sequencer.clone();
            tasks.spawn(async move {
                let streams = BTreeSet::from([StreamId::from_name(&format!("s{}", i % 3))]);
                let mut issued = Vec::new();
                for _ in 0..50 {
                    let token = sequencer.next_token(&streams, 1, None).await.unwrap();
                    issued.push(token.address().unwrap());
                }
                issued
            });
        }

        let mut all = BTreeSet::new();
        while let Some(issued) = tasks.join_next().await {
            for address in issued.unwrap() {
                assert!(all.insert(address), "address {address} issued twice");
            }
        }
        assert_eq!(all.len(), 400);
        assert_eq!(engine.sequencer.tail().map(|a| a.value()), Some(399));
    }

    #[tokio::test]
    async fn test_layout_mode_switch() {
        let engine = MockEngine::with_replication_mode(ReplicationMode::QuorumReplication);
        assert_eq!(
            engine.layout.layout().await.unwrap().replication_mode(),
            ReplicationMode::QuorumReplication
        );

        engine.layout.set_replication_mode(ReplicationMode::Replex);
        let layout = engine.layout.layout().await.unwrap();
        assert_eq!(layout.replication_mode(), ReplicationMode::Replex);
        assert_eq!(layout.epoch, 1);
    }
}
