//! File-backed settings store.

use quickproxy_engine::{
    FileSettingsStore, SettingsCollection, SettingsName, SettingsStore, StoredRecord,
};

use crate::common::{manual, system};

fn settings() -> SettingsCollection {
    SettingsCollection::new(system(), manual("proxy:8080"))
}

#[tokio::test]
async fn interrupted_write_is_recovered_from_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let store = FileSettingsStore::new(&path);
    let record = StoredRecord::new(SettingsName::QuickProxy, settings());
    store.save(record.clone()).await.unwrap();

    // Crash between moving the old file aside and persisting the new one.
    std::fs::rename(&path, path.with_extension("bak")).unwrap();

    let reopened = FileSettingsStore::new(&path);
    assert_eq!(reopened.load().await.unwrap(), record);
    assert!(path.exists());
}

#[tokio::test]
async fn concurrent_patches_are_both_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.json"));

    let (a, b) = tokio::join!(
        store.save(StoredRecord::current_only(SettingsName::QuickProxy)),
        store.save(StoredRecord::settings_only(settings())),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        store.load().await.unwrap(),
        StoredRecord::new(SettingsName::QuickProxy, settings())
    );
}

#[tokio::test]
async fn blank_file_is_an_empty_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "  \n").unwrap();

    let store = FileSettingsStore::new(&path);
    assert!(store.load().await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn record_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");
    let store = FileSettingsStore::new(&path);
    store
        .save(StoredRecord::settings_only(settings()))
        .await
        .unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
