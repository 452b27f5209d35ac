//! Integration tests for listing and drift detection.

mod common;

use common::{data, Harness};
use kvmirror::secrets::{SecretBackend, SecretPath};

#[tokio::test]
async fn test_synced_tree_reports_nothing() {
    let h = Harness::new();
    h.create("payments/db", &[("user", "admin")]).await;
    h.create("payments/cache", &[("token", "t")]).await;
    let path = h.create("search/api", &[("key", "k")]).await;
    h.engine.delete(&path, None, true).await.unwrap();

    let report = h.engine.check_sync("platform-a").await.unwrap();
    assert_eq!(report.scanned, 3);
    assert!(report.is_in_sync(), "unexpected drift: {:?}", report.drift);
}

#[tokio::test]
async fn test_missing_mirror_version_is_reported() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.write_primary_only(&path, &[("user", "admin"), ("pass", "p")]).await;

    let report = h.engine.check_sync("platform-a").await.unwrap();
    let drift = &report.drift[&path];
    assert_eq!(drift.primary.current_version, Some(2));
    assert_eq!(drift.mirror.current_version, Some(1));
    assert_eq!(drift.drifted_versions, vec![2]);
}

#[tokio::test]
async fn test_deletion_state_mismatch_is_reported() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.backend.soft_delete(path.primary(), &[1]).await.unwrap();

    let report = h.engine.check_sync("platform-a").await.unwrap();
    assert_eq!(report.drift[&path].drifted_versions, vec![1]);
}

#[tokio::test]
async fn test_orphan_mirror_is_reported_under_logical_path() {
    let h = Harness::new();
    h.backend
        .write_version("ci/platform-a/orphan", &data(&[("k", "")]), None)
        .await
        .unwrap();

    let report = h.engine.check_sync("platform-a").await.unwrap();
    let orphan = SecretPath::parse("platform-a/orphan").unwrap();
    assert_eq!(report.drift.len(), 1);
    assert_eq!(report.drift[&orphan].primary.current_version, None);
    assert_eq!(report.drift[&orphan].mirror.current_version, Some(1));
}

#[tokio::test]
async fn test_whole_mount_scan_counts_each_secret_once() {
    let h = Harness::new();
    h.create("payments/db", &[("user", "admin")]).await;

    let report = h.engine.check_sync("").await.unwrap();
    assert_eq!(report.scanned, 1);
    assert!(report.is_in_sync());
}

#[tokio::test]
async fn test_scope_is_respected() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.write_primary_only(&path, &[("user", "x")]).await;

    let report = h.engine.check_sync("platform-a/search").await.unwrap();
    assert_eq!(report.scanned, 0);
    assert!(report.drift.is_empty());
}

#[tokio::test]
async fn test_list_excludes_mirror_tree() {
    let h = Harness::new();
    h.create("payments/db", &[("user", "admin")]).await;
    h.create("payments/cache", &[("token", "t")]).await;

    let paths = h.engine.list("").await.unwrap();
    let names: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    assert_eq!(names, vec!["platform-a/payments/cache", "platform-a/payments/db"]);
}

#[tokio::test]
async fn test_check_sync_only_reads() {
    let h = Harness::new();
    let path = h.create("payments/db", &[("user", "admin")]).await;
    h.write_primary_only(&path, &[("user", "x")]).await;
    h.backend.clear_journal().await;

    h.engine.check_sync("platform-a").await.unwrap();
    assert!(h.backend.journal().await.is_empty());
}
