//! Embed merge strategy E2E tests.
//!
//! Timeline events are appended to their complaint document in source
//! order, within the same rebuild as the complaints themselves.

use pretty_assertions::assert_eq;
use serde_json::json;

use e2e_tests::{event, TestHarness};

#[test]
fn test_timeline_accumulates_in_source_order() {
    let harness = TestHarness::new();
    let summary = harness.rebuild(&harness.registry(), &["cr"]);
    assert!(!summary.has_failures());

    let cr = harness.doc("cr", "cr", "C100").unwrap();
    assert_eq!(cr["category"], "Use of force");
    assert_eq!(
        cr["timeline"],
        json!([
            {"seq": 1, "kind": "filed"},
            {"seq": 2, "kind": "investigated"},
        ])
    );
    assert_eq!(
        harness.doc("cr", "cr", "C200").unwrap()["timeline"],
        json!([{"seq": 1, "kind": "filed"}])
    );
}

#[test]
fn test_embed_without_parent_creates_it() {
    let harness = TestHarness::new();
    harness
        .timeline
        .update(|rows| rows.push(event("C300", 1, "filed")));

    harness.rebuild(&harness.registry(), &["cr"]);
    let orphan = harness.doc("cr", "cr", "C300").unwrap();
    assert_eq!(orphan["timeline"], json!([{"seq": 1, "kind": "filed"}]));
    assert_eq!(harness.count("cr", "cr"), 3);
}

#[test]
fn test_rebuild_does_not_duplicate_timeline() {
    let harness = TestHarness::new();
    let registry = harness.registry();
    harness.rebuild(&registry, &["cr"]);
    harness.rebuild(&registry, &["cr"]);

    let cr = harness.doc("cr", "cr", "C100").unwrap();
    assert_eq!(cr["timeline"].as_array().map(Vec::len), Some(2));
}
