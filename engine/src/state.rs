//! Reconciler working memory.

use quickproxy_types::{SettingsCollection, SettingsName};

/// Conceptual state derived from [`ReconcilerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Settings not loaded this session.
    Uninitialized,
    /// Private-window access denied; nothing may be applied.
    BlockedPrivateWindows,
    /// Another agent controls the proxy setting; nothing may be applied.
    BlockedNoControl,
    Active,
}

/// Everything the reconciler knows. Reconstructable from the store at any time.
///
/// Invariant: `settings` holds a configuration for every name, so
/// `current_settings_name` always refers to a present key.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerState {
    pub settings: Option<SettingsCollection>,
    /// Configuration last applied successfully to the live subsystem.
    pub current_settings_name: Option<SettingsName>,
    pub is_allowed_in_private_windows: bool,
    pub has_control: bool,
    /// The last store write for this state failed; memory is ahead of disk.
    pub unpersisted: bool,
}

impl Default for ReconcilerState {
    fn default() -> Self {
        Self {
            settings: None,
            current_settings_name: None,
            is_allowed_in_private_windows: true,
            has_control: true,
            unpersisted: false,
        }
    }
}

impl ReconcilerState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.settings.is_none() {
            Phase::Uninitialized
        } else if !self.is_allowed_in_private_windows {
            Phase::BlockedPrivateWindows
        } else if !self.has_control {
            Phase::BlockedNoControl
        } else {
            Phase::Active
        }
    }

    /// Whether the live proxy setting may be written.
    #[must_use]
    pub fn may_apply(&self) -> bool {
        self.is_allowed_in_private_windows && self.has_control
    }

    /// Whether the quick-proxy configuration is the one applied.
    #[must_use]
    pub fn quick_proxy_active(&self) -> bool {
        self.current_settings_name
            .is_some_and(|name| name != SettingsName::Default)
    }
}
