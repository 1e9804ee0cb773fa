//! Shared helpers for object layer tests

#![allow(dead_code)]

use sharedlog_common::StreamId;
use sharedlog_engine::MockEngine;
use sharedlog_objects::{ObjectsView, SharedMap};
use sharedlog_runtime::{LogRuntime, RuntimeConfig};
use std::time::Duration;

/// A client of `engine` with its own runtime and objects view
pub fn client(engine: &MockEngine) -> ObjectsView {
    let runtime = LogRuntime::with_config(
        engine.sequencer.clone(),
        engine.log_unit.clone(),
        engine.layout.clone(),
        RuntimeConfig::new()
            .with_hole_fill_retries(20)
            .with_hole_fill_wait(Duration::from_millis(5)),
    );
    ObjectsView::new(runtime)
}

pub async fn string_map(objects: &ObjectsView, name: &str) -> SharedMap<String, String> {
    objects
        .open_map(StreamId::from_name(name))
        .await
        .unwrap()
}

pub fn s(value: &str) -> String {
    value.to_string()
}
