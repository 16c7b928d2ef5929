//! Save path of the options page.
//!
//! Edits go straight to the store; a running [`crate::Reconciler`] picks them
//! up from the resulting storage notification.

use std::sync::Arc;

use tracing::{debug, info};

use quickproxy_types::{ProxyConfig, SettingsCollection, SettingsName, StoredRecord};

use crate::collaborators::SettingsStore;
use crate::error::OptionsError;

pub struct OptionsEditor {
    store: Arc<dyn SettingsStore>,
}

impl OptionsEditor {
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// The stored configurations, if any were seeded yet.
    pub async fn load(&self) -> Result<Option<SettingsCollection>, OptionsError> {
        Ok(self.store.load().await?.settings)
    }

    /// Validate `config` and store it under `name`, leaving the other
    /// configuration and the current name untouched.
    pub async fn save(
        &self,
        name: SettingsName,
        config: ProxyConfig,
    ) -> Result<SettingsCollection, OptionsError> {
        config.validate()?;
        debug!(settings_name = %name, value = ?config, "Saving proxy configuration");

        let mut settings = self
            .store
            .load()
            .await?
            .settings
            .ok_or(OptionsError::NotInitialized)?;
        settings.set(name, config);
        self.store
            .save(StoredRecord::settings_only(settings.clone()))
            .await?;

        info!(settings_name = %name, "Proxy configuration saved");
        Ok(settings)
    }
}
