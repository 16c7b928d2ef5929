//! Settings reconciler - the proxy settings state machine.
//!
//! Mediates between the settings store, the live proxy subsystem and the
//! action indicator. Every browser event ends up in one of the `on_*` handlers
//! below, and handlers may interleave at any await point:
//!
//! - State lives behind a synchronous mutex that is never held across an await,
//!   so every operation re-reads `settings`/`current_settings_name` at the
//!   moment it needs them.
//! - Loading or seeding is single-flight: concurrent callers queue on
//!   `init_gate` and find the state already populated when they get it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use quickproxy_types::{
    LevelOfControl, LiveProxySettings, SettingsCollection, SettingsName, StorageChange,
    StoredRecord,
};

use crate::collaborators::{Indicator, LiveProxy, Platform, SettingsStore};
use crate::error::ReconcileError;
use crate::indicator::IndicatorView;
use crate::state::ReconcilerState;

/// The systems a [`Reconciler`] talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SettingsStore>,
    pub live: Arc<dyn LiveProxy>,
    pub platform: Arc<dyn Platform>,
    pub indicator: Arc<dyn Indicator>,
}

/// How an apply request ended when it did not fail with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The configuration is live and recorded as current.
    Applied,
    /// Guard failed (no private-window access, no control, or nothing loaded);
    /// the live subsystem was not called.
    Blocked,
    /// The browser reported that the setting did not change.
    NotChanged,
    /// The browser rejected the request.
    Rejected {
        message: String,
        private_browsing: bool,
    },
}

/// Result of a click on the action button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Private-window access is missing; the options page was opened instead.
    OpenedOptionsPage,
    Toggled {
        target: SettingsName,
        outcome: ApplyOutcome,
    },
}

pub struct Reconciler {
    store: Arc<dyn SettingsStore>,
    live: Arc<dyn LiveProxy>,
    platform: Arc<dyn Platform>,
    indicator: Arc<dyn Indicator>,
    state: Mutex<ReconcilerState>,
    init_gate: AsyncMutex<()>,
}

impl Reconciler {
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            store: collaborators.store,
            live: collaborators.live,
            platform: collaborators.platform,
            indicator: collaborators.indicator,
            state: Mutex::new(ReconcilerState::default()),
            init_gate: AsyncMutex::new(()),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        self.lock().clone()
    }

    /// The indicator view for the current state.
    #[must_use]
    pub fn view(&self) -> IndicatorView {
        IndicatorView::for_state(&self.lock())
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    #[must_use]
    pub fn live(&self) -> &Arc<dyn LiveProxy> {
        &self.live
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Restore / initialize
    // ========================================================================

    /// Load state if this session has not done so yet, or retry writing
    /// state that an earlier save failed to persist.
    ///
    /// Concurrent callers wait for the load in flight instead of starting
    /// their own, so a first run seeds the store exactly once.
    pub async fn ensure_initialized(&self) -> Result<(), ReconcileError> {
        if self.is_settled() {
            return Ok(());
        }
        let _gate = self.init_gate.lock().await;
        if self.is_settled() {
            return Ok(());
        }

        let pending = {
            let state = self.lock();
            state.settings.clone().map(|settings| {
                StoredRecord::new(state.current_settings_name.unwrap_or_default(), settings)
            })
        };
        match pending {
            None => self.restore_or_init_gated(false).await,
            Some(record) => {
                warn!("Retrying write of unpersisted QuickProxy state");
                self.persist(record).await
            }
        }
    }

    /// Loaded and nothing left to write.
    fn is_settled(&self) -> bool {
        let state = self.lock();
        state.settings.is_some() && !state.unpersisted
    }

    /// Re-read the store and the live subsystem, seeding the store when it is empty.
    ///
    /// `is_init` marks the install/startup call, where an empty store is
    /// expected and not worth a warning. Never applies a configuration.
    pub async fn restore_or_init(&self, is_init: bool) -> Result<(), ReconcileError> {
        let _gate = self.init_gate.lock().await;
        self.restore_or_init_gated(is_init).await
    }

    async fn restore_or_init_gated(&self, is_init: bool) -> Result<(), ReconcileError> {
        debug!(is_init, "RestoreOrInitState");

        let live = self.live.get_current().await?;
        let record = self.store.load().await?;
        let allowed = self.platform.is_allowed_in_private_windows().await;

        let seed = if let Some(settings) = record.settings {
            info!(
                current_settings_name = ?record.current_settings_name,
                "Loaded stored QuickProxy state"
            );
            let current = record.current_settings_name.unwrap_or_default();
            self.adopt(settings, current);
            None
        } else {
            if !is_init {
                warn!("QuickProxy storage was wiped");
            }
            info!(
                value = ?live.value,
                "Initializing QuickProxy settings from the browser proxy settings"
            );
            let settings = SettingsCollection::seeded_from(&live.value);
            self.adopt(settings.clone(), SettingsName::Default);
            Some(StoredRecord::new(SettingsName::Default, settings))
        };

        {
            let mut state = self.lock();
            set_level_of_control(&mut state, &live.level_of_control);
            set_private_window_access(&mut state, allowed);
        }

        match seed {
            Some(record) => self.persist(record).await,
            None => Ok(()),
        }
    }

    fn adopt(&self, settings: SettingsCollection, current: SettingsName) {
        let mut state = self.lock();
        state.settings = Some(settings);
        state.current_settings_name = Some(current);
    }

    async fn persist(&self, patch: StoredRecord) -> Result<(), ReconcileError> {
        match self.store.save(patch).await {
            Ok(()) => {
                self.lock().unpersisted = false;
                Ok(())
            }
            Err(e) => {
                error!("Failed to persist QuickProxy state: {e}");
                self.lock().unpersisted = true;
                Err(e.into())
            }
        }
    }

    // ========================================================================
    // Apply
    // ========================================================================

    /// Make configuration `name` live.
    ///
    /// A no-op unless private-window access and control are both held. On
    /// success `name` becomes current and is persisted; on any other outcome
    /// the current name is left untouched. Retrying is left to the next event.
    pub async fn apply_settings(&self, name: SettingsName) -> Result<ApplyOutcome, ReconcileError> {
        let config = {
            let state = self.lock();
            if !state.may_apply() {
                debug!(settings_name = %name, "Not applying proxy settings, extension is blocked");
                return Ok(ApplyOutcome::Blocked);
            }
            match &state.settings {
                Some(settings) => settings.get(name).clone(),
                None => {
                    debug!(settings_name = %name, "Not applying proxy settings, nothing loaded");
                    return Ok(ApplyOutcome::Blocked);
                }
            }
        };

        debug!(settings_name = %name, value = ?config, "Setting browser proxy settings");

        match self.live.set_current(config).await {
            Ok(true) => {
                info!(settings_name = %name, "Browser proxy settings set");
                self.lock().current_settings_name = Some(name);
                self.persist(StoredRecord::current_only(name)).await?;
                Ok(ApplyOutcome::Applied)
            }
            Ok(false) => {
                error!(settings_name = %name, "Cannot set proxy settings");
                Ok(ApplyOutcome::NotChanged)
            }
            Err(err) => {
                error!(settings_name = %name, "Cannot set proxy settings. {err}");
                let private_browsing = err.is_private_browsing();
                if private_browsing {
                    set_private_window_access(&mut self.lock(), false);
                }
                Ok(ApplyOutcome::Rejected {
                    message: err.to_string(),
                    private_browsing,
                })
            }
        }
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    /// The live proxy setting or its level of control changed.
    pub async fn on_live_proxy_changed(
        &self,
        live: LiveProxySettings,
    ) -> Result<(), ReconcileError> {
        info!(
            level_of_control = %live.level_of_control,
            value = ?live.value,
            "Proxy settings changed"
        );

        // May fire before init() on browser startup.
        self.ensure_initialized().await?;

        set_level_of_control(&mut self.lock(), &live.level_of_control);
        self.refresh_indicator();
        Ok(())
    }

    /// The persisted record changed, possibly from another process.
    pub async fn on_storage_changed(&self, change: StorageChange) -> Result<(), ReconcileError> {
        if !change.settings_changed() {
            debug!("Stored settings unchanged, ignoring storage notification");
            return Ok(());
        }
        debug!(settings = ?change.new.settings, "Settings changed");

        let loaded = self.lock().settings.is_some();
        match change.new.settings {
            None => self.restore_or_init(false).await?,
            Some(_) if !loaded => self.ensure_initialized().await?,
            Some(settings) => {
                self.lock().settings = Some(settings);
            }
        }

        let current = self.lock().current_settings_name.unwrap_or_default();
        let result = self.apply_settings(current).await;
        self.refresh_indicator();
        result.map(|_| ())
    }

    /// The user clicked the action button.
    pub async fn on_action_clicked(&self) -> Result<ClickOutcome, ReconcileError> {
        debug!("Browser action clicked");

        self.ensure_initialized().await?;

        let allowed = self.lock().is_allowed_in_private_windows;
        if !allowed {
            self.platform.open_options_page().await;
            return Ok(ClickOutcome::OpenedOptionsPage);
        }

        let target = self.lock().current_settings_name.unwrap_or_default().toggle();
        let outcome = self.apply_settings(target).await;
        self.refresh_indicator();
        Ok(ClickOutcome::Toggled {
            target,
            outcome: outcome?,
        })
    }

    /// Install/startup: load or seed, then take control of the live setting.
    pub async fn init(&self) -> Result<ApplyOutcome, ReconcileError> {
        debug!("Init");

        self.restore_or_init(true).await?;

        let current = self.lock().current_settings_name.unwrap_or_default();
        let outcome = self.apply_settings(current).await;
        self.refresh_indicator();
        outcome
    }

    pub fn refresh_indicator(&self) {
        let view = self.view();
        self.indicator.render(&view);
    }
}

fn set_private_window_access(state: &mut ReconcilerState, allowed: bool) {
    if !allowed && state.is_allowed_in_private_windows {
        error!("Extension is not allowed to run in private windows");
    }
    state.is_allowed_in_private_windows = allowed;
}

fn set_level_of_control(state: &mut ReconcilerState, level: &LevelOfControl) {
    let can_control = level.can_control();
    if state.has_control && !can_control {
        error!(level_of_control = %level, "Extension cannot control proxy settings");
    } else if !state.has_control && can_control {
        info!(level_of_control = %level, "Extension regained control of proxy settings");
    }
    state.has_control = can_control;
}
