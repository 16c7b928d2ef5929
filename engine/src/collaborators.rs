//! Contracts of the systems the reconciler mediates between.
//!
//! Hosts provide implementations: a browser binding, the file-backed
//! [`crate::FileSettingsStore`], or in-memory fakes in tests. Change
//! notifications are broadcast channels; the reconciler's handlers are
//! subscribed to them by [`crate::EventPump`].

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;

use quickproxy_types::{LiveProxySettings, ProxyConfig, StorageChange, StoredRecord};

use crate::error::{ProxyError, StoreError};
use crate::indicator::IndicatorView;

/// Capacity used by the bundled implementations for change notifications.
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Durable key/value record holding the named configurations.
pub trait SettingsStore: Send + Sync {
    /// Whatever was last persisted; an empty record if nothing was.
    fn load(&self) -> BoxFuture<'_, Result<StoredRecord, StoreError>>;

    /// Overwrite the keys present in `patch`, keeping the others.
    ///
    /// Every save that changes the record is announced to subscribers,
    /// including saves made by the reconciler itself.
    fn save(&self, patch: StoredRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// The browser component that actually routes traffic.
pub trait LiveProxy: Send + Sync {
    fn get_current(&self) -> BoxFuture<'_, Result<LiveProxySettings, ProxyError>>;

    /// Ask the browser to apply `config`. `Ok(false)` means it did not take effect.
    fn set_current(&self, config: ProxyConfig) -> BoxFuture<'_, Result<bool, ProxyError>>;

    /// Fires on every change of value or level of control, whoever caused it.
    fn subscribe(&self) -> broadcast::Receiver<LiveProxySettings>;
}

/// Extension platform queries and navigation.
pub trait Platform: Send + Sync {
    fn is_allowed_in_private_windows(&self) -> BoxFuture<'_, bool>;

    /// Open the page where the user can grant permissions.
    fn open_options_page(&self) -> BoxFuture<'_, ()>;
}

/// The clickable action button.
pub trait Indicator: Send + Sync {
    fn render(&self, view: &IndicatorView);
}
