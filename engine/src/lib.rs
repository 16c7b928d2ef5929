//! Core engine for QuickProxy - the proxy settings reconciler.
//!
//! This crate contains the state machine that keeps the browser's live proxy
//! setting in line with the user's two named configurations, without any
//! browser dependencies. Hosts implement the traits in [`collaborators`] and
//! feed events through [`EventPump`] or [`dispatch`].

// Re-export from crates for public API
pub use quickproxy_types::{
    LevelOfControl, LiveProxySettings, PassthroughEntry, PassthroughError, PassthroughList,
    ProxyConfig, ProxyConfigError, ProxyType, SettingsCollection, SettingsName, SettingsSection,
    SocksVersion, StorageChange, StoredRecord, UnknownSettingsName, UnsupportedSocksVersion,
};

// Config types - loaded by the host
mod config;
pub use config::{
    AppConfig, ConfigError, HOME_ENV, LiveConfig, QuickProxyConfig, StoreConfig, base_dir,
    config_path, expand_env_vars, log_dir, resolve_path,
};

pub mod collaborators;
pub use collaborators::{Indicator, LiveProxy, NOTIFICATION_CAPACITY, Platform, SettingsStore};

mod error;
pub use error::{OptionsError, ProxyError, ReconcileError, StoreError};

mod events;
pub use events::{Event, EventPump, dispatch};

mod indicator;
pub use indicator::{
    IndicatorIcon, IndicatorView, TITLE_ACTIVE, TITLE_INACTIVE, TITLE_NO_CONTROL,
    TITLE_PRIVATE_WINDOWS,
};

mod options;
pub use options::OptionsEditor;

mod reconciler;
pub use reconciler::{ApplyOutcome, ClickOutcome, Collaborators, Reconciler};

mod state;
pub use state::{Phase, ReconcilerState};

mod store;
pub use store::FileSettingsStore;
