//! File-backed settings store.
//!
//! Persists the [`StoredRecord`] as pretty JSON with atomic replace, and
//! announces every effective change on a broadcast channel. Writers in other
//! processes are not observed; hosts that share the file deliver those
//! changes themselves.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, broadcast};

use quickproxy_types::{StorageChange, StoredRecord};
use quickproxy_utils::{AtomicWriteOptions, FileSyncPolicy, PersistMode};

use crate::collaborators::{NOTIFICATION_CAPACITY, SettingsStore};
use crate::error::StoreError;

pub struct FileSettingsStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_gate: AsyncMutex<()>,
    notify: broadcast::Sender<StorageChange>,
}

impl FileSettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            path: path.into(),
            write_gate: AsyncMutex::new(()),
            notify,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_record(&self) -> Result<StoredRecord, StoreError> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || quickproxy_utils::read_recovering(&path))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        match bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                serde_json::from_slice(&bytes).map_err(StoreError::Decode)
            }
            _ => Ok(StoredRecord::default()),
        }
    }

    async fn write_record(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record).map_err(StoreError::Encode)?;
        let path = self.path.clone();
        let options = AtomicWriteOptions {
            file_sync: FileSyncPolicy::SyncAll,
            mode: PersistMode::OwnerOnly,
        };
        tokio::task::spawn_blocking(move || {
            quickproxy_utils::atomic_write_with_options(&path, &bytes, options)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
        .map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole record. An empty record wipes the store.
    pub async fn replace(&self, record: StoredRecord) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let old = self.read_record().await?;
        self.write_record(&record).await?;
        self.announce(old, record);
        Ok(())
    }

    pub async fn wipe(&self) -> Result<(), StoreError> {
        self.replace(StoredRecord::default()).await
    }

    async fn merge(&self, patch: StoredRecord) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let old = self.read_record().await?;
        let mut new = old.clone();
        new.merge(patch);
        self.write_record(&new).await?;
        self.announce(old, new);
        Ok(())
    }

    fn announce(&self, old: StoredRecord, new: StoredRecord) {
        if old == new {
            return;
        }
        if self.notify.send(StorageChange { old, new }).is_err() {
            tracing::debug!(path = %self.path.display(), "No storage subscribers");
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> BoxFuture<'_, Result<StoredRecord, StoreError>> {
        Box::pin(self.read_record())
    }

    fn save(&self, patch: StoredRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.merge(patch))
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.notify.subscribe()
    }
}
