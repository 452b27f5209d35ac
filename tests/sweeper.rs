//! Integration tests for the retention sweep.

mod common;

use chrono::Duration;
use std::collections::BTreeMap;

use common::{data, metadata, Harness};
use kvmirror::secrets::SecretBackend;

#[tokio::test]
async fn test_nothing_is_due_before_the_grace_period() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.engine.destroy(&path).await.unwrap();

    h.clock.advance(Duration::days(7));
    let report = h.engine.clean("platform-a", false).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert!(report.eligible.is_empty());
    assert!(h.primary_metadata(&path).await.is_some());
}

#[tokio::test]
async fn test_dry_run_issues_no_mutations() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.create("payments/cache", &[("token", "t")]).await;
    h.engine.destroy(&path).await.unwrap();
    h.backend.clear_journal().await;

    h.clock.advance(Duration::days(8));
    let report = h.engine.clean("platform-a", true).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.scanned, 2);
    assert_eq!(report.eligible, vec![path.clone()]);
    assert!(report.destroyed.is_empty());
    assert!(h.backend.journal().await.is_empty());
    assert!(h.primary_metadata(&path).await.is_some());
}

#[tokio::test]
async fn test_due_secrets_are_removed_from_both_trees() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    let keep = h.create("payments/cache", &[("token", "t")]).await;
    h.engine.destroy(&path).await.unwrap();

    h.clock.advance(Duration::days(30));
    let report = h.engine.clean("platform-a", false).await.unwrap();

    assert_eq!(report.destroyed, vec![path.clone()]);
    assert!(report.errors.is_empty());
    assert!(h.primary_metadata(&path).await.is_none());
    assert!(h.mirror_metadata(&path).await.is_none());
    assert!(h.primary_metadata(&keep).await.is_some());
    assert!(h.mirror_metadata(&keep).await.is_some());

    // The path can be created afresh
    let version = h.engine.create(&path, data(&[("user", "new")]), metadata()).await.unwrap();
    assert_eq!(version, 1);
}

#[tokio::test]
async fn test_unparseable_dates_are_skipped() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    let schedule: BTreeMap<String, String> =
        [("destroy_after".to_string(), "soon".to_string())].into_iter().collect();
    h.backend.patch_metadata(path.primary(), &schedule).await.unwrap();

    let report = h.engine.clean("platform-a", false).await.unwrap();
    assert!(report.eligible.is_empty());
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_failures_are_collected_per_path() {
    let h = Harness::new();
    let first = h.create("payments/a", &[("k", "v")]).await;
    let second = h.create("payments/b", &[("k", "v")]).await;
    h.engine.destroy(&first).await.unwrap();
    h.engine.destroy(&second).await.unwrap();
    h.clock.advance(Duration::days(8));

    h.backend.fail_writes(true);
    let report = h.engine.clean("platform-a", false).await.unwrap();

    assert_eq!(report.eligible.len(), 2);
    assert!(report.destroyed.is_empty());
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.contains_key(first.as_str()));
    assert!(report.errors.contains_key(second.as_str()));
}

#[tokio::test]
async fn test_interrupted_sweep_finishes_on_retry() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.engine.destroy(&path).await.unwrap();
    h.clock.advance(Duration::days(9));

    h.backend.fail_next_write_to(path.mirror("ci"));
    let first = h.engine.clean("platform-a", false).await.unwrap();
    assert!(first.destroyed.is_empty());
    assert!(first.errors.contains_key(path.as_str()));
    // The primary still carries the schedule, so the path stays visible
    assert!(h.primary_metadata(&path).await.is_some());

    let retry = h.engine.clean("platform-a", false).await.unwrap();
    assert_eq!(retry.destroyed, vec![path.clone()]);
    assert!(retry.errors.is_empty());
    assert!(h.primary_metadata(&path).await.is_none());
    assert!(h.mirror_metadata(&path).await.is_none());

    let version = h.engine.create(&path, data(&[("user", "new")]), metadata()).await.unwrap();
    assert_eq!(version, 1);
}

#[tokio::test]
async fn test_sweep_ignores_mirror_paths() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    let schedule: BTreeMap<String, String> =
        [("destroy_after".to_string(), "2000-01-01".to_string())].into_iter().collect();
    h.backend.patch_metadata(&path.mirror("ci"), &schedule).await.unwrap();

    let report = h.engine.clean("", true).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert!(report.eligible.is_empty());
}
