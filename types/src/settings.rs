//! Named proxy configurations and the persisted record that holds them.
//!
//! Exactly two configurations exist: `"default"` and `"quick-proxy"`. The names
//! double as storage keys, so they are never localized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy::ProxyConfig;

/// Name of one of the two configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingsName {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "quick-proxy")]
    QuickProxy,
}

impl SettingsName {
    pub const ALL: [SettingsName; 2] = [SettingsName::Default, SettingsName::QuickProxy];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::QuickProxy => "quick-proxy",
        }
    }

    /// The other configuration. Applying `toggle` twice yields `self`.
    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            Self::Default => Self::QuickProxy,
            Self::QuickProxy => Self::Default,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Default => "Default proxy settings",
            Self::QuickProxy => "QuickProxy proxy settings",
        }
    }
}

impl fmt::Display for SettingsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown settings name '{0}', expected 'default' or 'quick-proxy'")]
pub struct UnknownSettingsName(String);

impl FromStr for SettingsName {
    type Err = UnknownSettingsName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownSettingsName(s.to_string()))
    }
}

/// Both named configurations. A key is present for every [`SettingsName`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsCollection {
    #[serde(rename = "default")]
    default: ProxyConfig,
    #[serde(rename = "quick-proxy")]
    quick_proxy: ProxyConfig,
}

impl SettingsCollection {
    #[must_use]
    pub fn new(default: ProxyConfig, quick_proxy: ProxyConfig) -> Self {
        Self {
            default,
            quick_proxy,
        }
    }

    /// Both configurations start out as copies of `config`.
    #[must_use]
    pub fn seeded_from(config: &ProxyConfig) -> Self {
        Self::new(config.clone(), config.clone())
    }

    #[must_use]
    pub fn get(&self, name: SettingsName) -> &ProxyConfig {
        match name {
            SettingsName::Default => &self.default,
            SettingsName::QuickProxy => &self.quick_proxy,
        }
    }

    pub fn set(&mut self, name: SettingsName, config: ProxyConfig) {
        match name {
            SettingsName::Default => self.default = config,
            SettingsName::QuickProxy => self.quick_proxy = config,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingsName, &ProxyConfig)> {
        SettingsName::ALL.into_iter().map(|name| (name, self.get(name)))
    }
}

/// The persisted document: `{ currentSettingsName, settings }`.
///
/// Both keys are optional because the store may be empty or partially wiped.
/// `proxySettings` is accepted as the legacy spelling of `settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_settings_name: Option<SettingsName>,
    #[serde(default, alias = "proxySettings", skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsCollection>,
}

impl StoredRecord {
    #[must_use]
    pub fn new(current_settings_name: SettingsName, settings: SettingsCollection) -> Self {
        Self {
            current_settings_name: Some(current_settings_name),
            settings: Some(settings),
        }
    }

    /// A patch that only updates `currentSettingsName`.
    #[must_use]
    pub fn current_only(name: SettingsName) -> Self {
        Self {
            current_settings_name: Some(name),
            settings: None,
        }
    }

    /// A patch that only updates `settings`.
    #[must_use]
    pub fn settings_only(settings: SettingsCollection) -> Self {
        Self {
            current_settings_name: None,
            settings: Some(settings),
        }
    }

    /// Overwrite the keys present in `patch`, keep the rest.
    pub fn merge(&mut self, patch: StoredRecord) {
        if let Some(name) = patch.current_settings_name {
            self.current_settings_name = Some(name);
        }
        if let Some(settings) = patch.settings {
            self.settings = Some(settings);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_settings_name.is_none() && self.settings.is_none()
    }
}

/// Notification that the persisted record changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old: StoredRecord,
    pub new: StoredRecord,
}

impl StorageChange {
    /// Whether the named configurations differ between `old` and `new`.
    #[must_use]
    pub fn settings_changed(&self) -> bool {
        self.old.settings != self.new.settings
    }
}
