//! Live proxy subsystem backed by a JSON document.
//!
//! Stands in for the browser when driving the reconciler from a terminal:
//! `value` is the active proxy configuration, `levelOfControl` says who owns
//! it and `privateWindowsAllowed` is the extension's private-window grant.

use std::path::PathBuf;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{debug, info, warn};

use quickproxy_engine::{
    LevelOfControl, LiveProxy, LiveProxySettings, NOTIFICATION_CAPACITY, Platform, ProxyConfig,
    ProxyError, ProxyType,
};

/// Browsers reject proxy changes with this message when the extension may
/// not run in private windows.
const PRIVATE_BROWSING_REJECTION: &str = "proxy.settings requires private browsing permission.";

const fn default_true() -> bool {
    true
}

fn default_value() -> ProxyConfig {
    ProxyConfig::with_type(ProxyType::System)
}

fn default_level() -> LevelOfControl {
    LevelOfControl::ControllableByThisExtension
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDocument {
    #[serde(default = "default_value")]
    pub value: ProxyConfig,
    #[serde(default = "default_level")]
    pub level_of_control: LevelOfControl,
    #[serde(default = "default_true")]
    pub private_windows_allowed: bool,
}

impl Default for LiveDocument {
    fn default() -> Self {
        Self {
            value: default_value(),
            level_of_control: default_level(),
            private_windows_allowed: true,
        }
    }
}

impl LiveDocument {
    fn settings(&self) -> LiveProxySettings {
        LiveProxySettings {
            value: self.value.clone(),
            level_of_control: self.level_of_control.clone(),
        }
    }
}

pub struct FileLiveProxy {
    path: PathBuf,
    write_gate: AsyncMutex<()>,
    notify: broadcast::Sender<LiveProxySettings>,
}

impl FileLiveProxy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            path: path.into(),
            write_gate: AsyncMutex::new(()),
            notify,
        }
    }

    pub async fn read(&self) -> Result<LiveDocument, ProxyError> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || quickproxy_utils::read_recovering(&path))
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?
            .map_err(|e| {
                ProxyError::Unavailable(format!("cannot read {}: {e}", self.path.display()))
            })?;

        match bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                serde_json::from_slice(&bytes).map_err(|e| {
                    ProxyError::Unavailable(format!("malformed {}: {e}", self.path.display()))
                })
            }
            _ => Ok(LiveDocument::default()),
        }
    }

    async fn write(&self, doc: &LiveDocument) -> Result<(), ProxyError> {
        let bytes =
            serde_json::to_vec_pretty(doc).map_err(|e| ProxyError::Unavailable(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || quickproxy_utils::atomic_write(&path, &bytes))
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?
            .map_err(|e| {
                ProxyError::Unavailable(format!("cannot write {}: {e}", self.path.display()))
            })
    }

    /// Apply `edit` to the document and announce the result if the value or
    /// its level of control changed. An `Err` from `edit` leaves the file
    /// untouched.
    async fn update<T, F>(&self, edit: F) -> Result<(LiveDocument, T), ProxyError>
    where
        F: FnOnce(&mut LiveDocument) -> Result<T, ProxyError> + Send,
    {
        let _gate = self.write_gate.lock().await;
        let old = self.read().await?;
        let mut new = old.clone();
        let out = edit(&mut new)?;
        if new != old {
            self.write(&new).await?;
        }
        if new.settings() != old.settings() && self.notify.send(new.settings()).is_err() {
            debug!(path = %self.path.display(), "No live proxy subscribers");
        }
        Ok((new, out))
    }

    /// Simulate another agent taking or releasing the proxy setting.
    pub async fn set_level_of_control(
        &self,
        level: LevelOfControl,
    ) -> Result<LiveProxySettings, ProxyError> {
        let (doc, ()) = self
            .update(|doc| {
                doc.level_of_control = level;
                Ok(())
            })
            .await?;
        Ok(doc.settings())
    }

    pub async fn set_private_windows_allowed(&self, allowed: bool) -> Result<(), ProxyError> {
        self.update(|doc| {
            doc.private_windows_allowed = allowed;
            Ok(())
        })
        .await
        .map(|_| ())
    }
}

impl LiveProxy for FileLiveProxy {
    fn get_current(&self) -> BoxFuture<'_, Result<LiveProxySettings, ProxyError>> {
        Box::pin(async move { Ok(self.read().await?.settings()) })
    }

    fn set_current(&self, config: ProxyConfig) -> BoxFuture<'_, Result<bool, ProxyError>> {
        Box::pin(async move {
            let (_, applied) = self
                .update(|doc| {
                    if !doc.private_windows_allowed {
                        return Err(ProxyError::rejected(PRIVATE_BROWSING_REJECTION));
                    }
                    if !doc.level_of_control.can_control() {
                        return Ok(false);
                    }
                    doc.value = config;
                    Ok(true)
                })
                .await?;
            Ok(applied)
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<LiveProxySettings> {
        self.notify.subscribe()
    }
}

impl Platform for FileLiveProxy {
    fn is_allowed_in_private_windows(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.read().await {
                Ok(doc) => doc.private_windows_allowed,
                Err(e) => {
                    warn!("Cannot read private window access, assuming allowed: {e}");
                    true
                }
            }
        })
    }

    fn open_options_page(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(path = %self.path.display(), "Opening QuickProxy settings");
        })
    }
}
