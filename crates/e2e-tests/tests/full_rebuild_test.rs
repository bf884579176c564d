//! Full rebuild E2E tests.
//!
//! A full rebuild publishes every source record (with 1:N expansion),
//! swaps the alias only once the whole build succeeded, and can be run
//! again with the same result.

use pretty_assertions::assert_eq;

use docsync_indexing::{FullReindexer, IndexingError, Reindex};
use docsync_store::IndexStore;
use docsync_types::DocType;
use e2e_tests::{officer, TestHarness};

#[test]
fn test_full_rebuild_matches_source() {
    let harness = TestHarness::new();
    let registry = harness.registry();

    let summary = harness.rebuild(&registry, &[]);
    assert!(!summary.has_failures(), "{:?}", summary.failed_aliases());

    assert_eq!(harness.count("officers", "officer"), 3);
    assert_eq!(harness.count("cr", "cr"), 2);
    // C100 accuses two officers, C200 one
    assert_eq!(harness.count("officers", "accused"), 3);

    let doc = harness.doc("officers", "officer", "2").unwrap();
    assert_eq!(doc["full_name"], "Ronald Watts");
    assert_eq!(doc["rank"], "Sergeant");
    assert!(harness.doc("officers", "accused", "C100-2").is_some());
}

#[test]
fn test_full_rebuild_is_idempotent() {
    let harness = TestHarness::new();
    let registry = harness.registry();

    harness.rebuild(&registry, &[]);
    let first_index = harness.index_behind("officers").unwrap();
    let first = harness.doc("officers", "officer", "1");

    harness.rebuild(&registry, &[]);
    let second_index = harness.index_behind("officers").unwrap();

    assert_ne!(first_index, second_index);
    assert_eq!(harness.doc("officers", "officer", "1"), first);
    assert_eq!(harness.count("officers", "officer"), 3);
    assert_eq!(harness.count("officers", "accused"), 3);
    // the previous physical index is dropped after the swap
    assert!(!harness.store.index_exists(&first_index));
}

#[test]
fn test_reads_see_old_index_until_swap() {
    let harness = TestHarness::new();
    harness.rebuild(&harness.registry(), &["officers"]);
    let before = harness.index_behind("officers").unwrap();

    harness
        .officers
        .update(|rows| rows.push(officer(4, "Xavier", "Elizondo", "Sergeant")));
    let unit = FullReindexer::new(harness.officer_indexer(), harness.config.clone());

    harness
        .officers_alias
        .indexing(|| {
            let report = unit.reindex()?;
            assert_eq!(report.docs_written, 4);
            // the write index is fully populated, reads still go to the old one
            assert_eq!(harness.index_behind("officers").unwrap(), before);
            assert_eq!(harness.count("officers", "officer"), 3);
            Ok(())
        })
        .unwrap();

    assert_ne!(harness.index_behind("officers").unwrap(), before);
    assert_eq!(harness.count("officers", "officer"), 4);
}

#[test]
fn test_failed_build_leaves_read_index_untouched() {
    let harness = TestHarness::new();
    harness.rebuild(&harness.registry(), &["officers"]);
    let before = harness.index_behind("officers").unwrap();

    harness.officers.update(|rows| rows.clear());
    let unit = FullReindexer::new(harness.officer_indexer(), harness.config.clone());
    let result: Result<(), IndexingError> = harness.officers_alias.indexing(|| {
        unit.reindex()?;
        Err(IndexingError::Source("connection reset".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(harness.index_behind("officers").unwrap(), before);
    assert_eq!(harness.count("officers", "officer"), 3);
}

#[test]
fn test_rejected_documents_block_the_swap() {
    let harness = TestHarness::new();
    harness.rebuild(&harness.registry(), &[]);
    let before = harness.index_behind("officers").unwrap();

    let registry = harness.registry_with(harness.officer_indexer().with_narrow_mapping());
    let summary = harness.rebuild(&registry, &["officers"]);

    assert_eq!(summary.failed_aliases(), vec!["officers"]);
    let error = summary.groups[0].error.clone().unwrap_or_default();
    assert!(error.contains("rejected 3 documents"), "{error}");
    assert_eq!(harness.index_behind("officers").unwrap(), before);

    // the failed index stays around for inspection until the next build
    let failed = harness.officers_alias.failed_index().unwrap().unwrap();
    assert!(harness.store.index_exists(&failed));
    assert_eq!(
        harness
            .store
            .count(&failed, &DocType::new("officer"), &docsync_store::Query::MatchAll)
            .unwrap(),
        0
    );
}

#[test]
fn test_snapshot_survives_restart() {
    let harness = TestHarness::new();
    harness.rebuild(&harness.registry(), &[]);
    harness.store.save_snapshot(&harness.snapshot_path).unwrap();

    let reopened = docsync_store::MemoryIndexStore::load_snapshot(&harness.snapshot_path).unwrap();
    assert_eq!(
        reopened.resolve_alias("cr").unwrap(),
        harness.index_behind("cr")
    );
    assert_eq!(
        reopened
            .count("officers", &DocType::new("accused"), &docsync_store::Query::MatchAll)
            .unwrap(),
        3
    );
}
