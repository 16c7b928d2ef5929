//! Core domain types for QuickProxy.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The reconciler, the stores and the host binary all speak in these types.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod control;
mod passthrough;
mod proxy;
mod settings;

pub use control::{LevelOfControl, LiveProxySettings};
pub use passthrough::{PassthroughEntry, PassthroughError, PassthroughList};
pub use proxy::{
    ProxyConfig, ProxyConfigError, ProxyType, SettingsSection, SocksVersion,
    UnsupportedSocksVersion,
};
pub use settings::{
    SettingsCollection, SettingsName, StorageChange, StoredRecord, UnknownSettingsName,
};
