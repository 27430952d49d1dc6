//! Tests for the resource pool over real log files.

use std::path::Path;
use std::sync::Arc;

use tailrun::pool::{PoolError, ResourcePool};
use tailrun::resource::{LogContent, ResourceError};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use super::{append, fast_options};

fn pool() -> ResourcePool<LogContent> {
    let options = fast_options();
    ResourcePool::new(move |path: &Path| LogContent::open(path, &options))
}

#[tokio::test]
async fn one_resource_per_path() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.log");
    let b = dir.path().join("b.log");
    let pool = pool();

    let first = assert_ok!(pool.get_or_create(&a));
    let again = assert_ok!(pool.get_or_create(&a));
    let other = assert_ok!(pool.get_or_create(&b));

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(pool.len(), 2);
}

#[tokio::test]
async fn resource_with_listener_survives_disposal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let pool = pool();

    let resource = assert_ok!(pool.get_or_create(&path));
    let listener = assert_ok!(resource.add_change_listener(|_| {}));

    assert!(!assert_ok!(pool.dispose_if_unused(&resource)));
    assert!(!resource.is_closed());

    assert!(resource.remove_change_listener(listener));
    assert!(assert_ok!(pool.dispose_if_unused(&resource)));
    assert!(resource.is_closed());
    assert!(!pool.contains(&path));
}

#[tokio::test]
async fn closed_resource_refuses_listeners() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let pool = pool();

    let resource = assert_ok!(pool.get_or_create(&path));
    assert!(assert_ok!(pool.dispose_if_unused(&resource)));

    let err = assert_err!(resource.add_change_listener(|_| {}));
    assert!(matches!(err, ResourceError::Closed(_)));

    // A fresh instance replaces the disposed one.
    let fresh = assert_ok!(pool.get_or_create(&path));
    assert!(!Arc::ptr_eq(&resource, &fresh));
    assert_ok!(fresh.add_change_listener(|_| {}));
}

#[tokio::test]
async fn disposal_of_foreign_instance_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let pool = pool();

    let _cached = assert_ok!(pool.get_or_create(&path));
    let stranger = assert_ok!(LogContent::open(&path, &fast_options()));

    let err = assert_err!(pool.dispose_if_unused(&stranger));
    assert!(matches!(err.source, PoolError::ResourceNotOwned(_)));
    assert_eq!(err.path, path);
    assert!(!stranger.is_closed());
}

#[tokio::test]
async fn size_and_full_text_read_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "one\ntwo\n");
    let pool = pool();

    let resource = assert_ok!(pool.get_or_create(&path));
    assert_eq!(assert_ok!(resource.size().await), 8);
    assert_eq!(
        assert_ok!(resource.read_full_text().await).lines(),
        vec!["one", "two"]
    );
}
