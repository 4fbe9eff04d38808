//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Integration tests for broadcasts.
//!
//! These tests verify that:
//! - Answers from every connected target are keyed by target
//! - A timeout carries the partial answers and the silent targets
//! - Broadcast streams merge tagged values and end with the last target
//! - Only targets connected when the broadcast starts are included
//! - Dropping a broadcast stream releases every per-target call

mod common;

use common::Family;
use futures_util::StreamExt;
use msgbridge::{BridgeError, TaggedValue, TargetId};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn test_broadcast_collects_every_answer() {
    let family = Family::new(&["frame-a", "frame-b"]);
    for child in &family.children {
        child
            .to_parent()
            .unwrap()
            .react_to("ping", |_| async { json!({"pong": true}) });
    }
    family.host.connect(["frame-a", "frame-b"]).await.unwrap();

    let results = family.host.broadcast_request("ping", json!({})).await.unwrap();

    let expected: HashMap<TargetId, _> = [
        (TargetId::from("frame-a"), json!({"pong": true})),
        (TargetId::from("frame-b"), json!({"pong": true})),
    ]
    .into_iter()
    .collect();
    assert_eq!(results, expected);
    assert_eq!(family.host.pending_calls(), 0);
}

#[tokio::test]
async fn test_broadcast_timeout_carries_partial_results() {
    let family = Family::new(&["frame-a", "frame-b"]);
    family
        .child("frame-a")
        .to_parent()
        .unwrap()
        .react_to("ping", |_| async { json!({"pong": true}) });
    family.host.connect(["frame-a", "frame-b"]).await.unwrap();

    let result = family
        .host
        .broadcast_request_timeout("ping", json!({}), Duration::from_millis(100))
        .await;

    match result {
        Err(BridgeError::BroadcastTimeout {
            partial, missing, ..
        }) => {
            assert_eq!(partial.len(), 1);
            assert_eq!(partial[&TargetId::from("frame-a")], json!({"pong": true}));
            assert_eq!(missing, vec![TargetId::from("frame-b")]);
        }
        other => panic!("expected broadcast timeout, got {other:?}"),
    }
    assert_eq!(family.host.pending_calls(), 0);
}

#[tokio::test]
async fn test_broadcast_without_targets_is_empty() {
    let family = Family::new(&[]);
    let results = family.host.broadcast_request("ping", json!({})).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_broadcast_skips_unconnected_targets() {
    let family = Family::new(&["frame-a", "frame-b"]);
    let mut b_requests = family.child("frame-b").on_requests();
    family
        .child("frame-a")
        .to_parent()
        .unwrap()
        .react_to("ping", |_| async { json!("a") });
    family.host.connect(["frame-a"]).await.unwrap();

    let results = family.host.broadcast_request("ping", json!({})).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[&TargetId::from("frame-a")], json!("a"));
    assert!(
        tokio::time::timeout(Duration::from_millis(50), b_requests.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_broadcast_stream_merges_tagged_values() {
    let family = Family::new(&["frame-a", "frame-b"]);
    for child in &family.children {
        let parent = child.to_parent().unwrap();
        let name = child.identity().to_string();
        let mut requests = parent.listen_for("status");
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            parent.respond(request.id(), json!(format!("{name}:1")), false).unwrap();
            parent.respond(request.id(), json!(format!("{name}:2")), false).unwrap();
            parent.respond(request.id(), json!(null), true).unwrap();
        });
    }
    family.host.connect(["frame-a", "frame-b"]).await.unwrap();

    let stream = family
        .host
        .broadcast_observable("status", json!({}))
        .subscribe()
        .unwrap();
    assert_eq!(
        stream.targets(),
        &[TargetId::from("frame-a"), TargetId::from("frame-b")]
    );

    let values: Vec<TaggedValue> = stream.collect().await;
    assert_eq!(values.len(), 4);
    for target in ["frame-a", "frame-b"] {
        let own: Vec<_> = values
            .iter()
            .filter(|tagged| tagged.target.as_str() == target)
            .map(|tagged| tagged.value.clone())
            .collect();
        assert_eq!(own, vec![json!(format!("{target}:1")), json!(format!("{target}:2"))]);
    }
    assert_eq!(family.host.pending_calls(), 0);
}

#[tokio::test]
async fn test_late_joiner_is_included_in_next_broadcast() {
    let family = Family::new(&["frame-a"]);
    family
        .child("frame-a")
        .to_parent()
        .unwrap()
        .react_to("ping", |_| async { json!("a") });
    family.host.connect(["frame-a"]).await.unwrap();
    assert_eq!(family.host.broadcast_request("ping", json!({})).await.unwrap().len(), 1);

    let late = common::child(&family.network, "frame-c", "host");
    family
        .child("frame-a")
        .to_parent()
        .unwrap()
        .react_to("ping", |_| async { json!("a") });
    late.to_parent()
        .unwrap()
        .react_to("ping", |_| async { json!("c") });
    family.host.connect(["frame-c"]).await.unwrap();

    let results = family.host.broadcast_request("ping", json!({})).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[&TargetId::from("frame-c")], json!("c"));
}

#[tokio::test]
async fn test_unbounded_broadcast_timeout() {
    let family = Family::new(&["frame-a", "frame-b"]);
    for child in &family.children {
        child
            .to_parent()
            .unwrap()
            .react_to("ping", |_| async { json!({"pong": true}) });
    }
    family.host.connect(["frame-a", "frame-b"]).await.unwrap();

    let results = tokio::time::timeout(
        Duration::from_secs(2),
        family
            .host
            .broadcast_request_timeout("ping", json!({}), Duration::MAX),
    )
    .await
    .expect("broadcast must complete")
    .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(family.host.pending_calls(), 0);
}

#[tokio::test]
async fn test_dropped_broadcast_stream_orphans_late_frames() {
    let family = Family::new(&["frame-a", "frame-b"]);
    let parents: Vec<_> = family
        .children
        .iter()
        .map(|child| child.to_parent().unwrap())
        .collect();
    let mut listeners: Vec<_> = parents
        .iter()
        .map(|parent| parent.listen_for("status"))
        .collect();
    family.host.connect(["frame-a", "frame-b"]).await.unwrap();

    let stream = family
        .host
        .broadcast_observable("status", json!({}))
        .subscribe()
        .unwrap();
    let mut requests = Vec::new();
    for listener in &mut listeners {
        requests.push(listener.recv().await.unwrap());
    }
    assert_eq!(family.host.pending_calls(), 2);

    drop(stream);
    assert_eq!(family.host.pending_calls(), 0);

    for (parent, request) in parents.iter().zip(&requests) {
        parent.respond(request.id(), json!("late"), false).unwrap();
        parent.respond(request.id(), json!(null), true).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(family.host.stats().orphan_responses(), 4);
    assert_eq!(family.host.pending_calls(), 0);
}
