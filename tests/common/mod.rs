//! Shared test utilities and fixtures
//!
//! A reconciler wired to a real [`FileSettingsStore`] in a temp dir and an
//! in-memory browser.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tempfile::TempDir;
use tokio::sync::broadcast;

use quickproxy_engine::{
    Collaborators, FileSettingsStore, Indicator, IndicatorView, LevelOfControl, LiveProxy,
    LiveProxySettings, NOTIFICATION_CAPACITY, Platform, ProxyConfig, ProxyError, ProxyType,
    Reconciler,
};

/// In-memory browser: live proxy setting plus private-window grant.
pub struct Browser {
    current: Mutex<LiveProxySettings>,
    private_windows_allowed: AtomicBool,
    pub applied: AtomicUsize,
    notify: broadcast::Sender<LiveProxySettings>,
}

impl Browser {
    pub fn new(value: ProxyConfig) -> Self {
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            current: Mutex::new(LiveProxySettings {
                value,
                level_of_control: LevelOfControl::ControllableByThisExtension,
            }),
            private_windows_allowed: AtomicBool::new(true),
            applied: AtomicUsize::new(0),
            notify,
        }
    }

    pub fn value(&self) -> ProxyConfig {
        self.current.lock().unwrap().value.clone()
    }

    pub fn set_level(&self, level: LevelOfControl) -> LiveProxySettings {
        let live = {
            let mut current = self.current.lock().unwrap();
            current.level_of_control = level;
            current.clone()
        };
        let _ = self.notify.send(live.clone());
        live
    }

    pub fn set_private_windows_allowed(&self, allowed: bool) {
        self.private_windows_allowed.store(allowed, Ordering::SeqCst);
    }
}

impl LiveProxy for Browser {
    fn get_current(&self) -> BoxFuture<'_, Result<LiveProxySettings, ProxyError>> {
        Box::pin(async move { Ok(self.current.lock().unwrap().clone()) })
    }

    fn set_current(&self, config: ProxyConfig) -> BoxFuture<'_, Result<bool, ProxyError>> {
        Box::pin(async move {
            if !self.private_windows_allowed.load(Ordering::SeqCst) {
                return Err(ProxyError::rejected(
                    "proxy.settings requires private browsing permission.",
                ));
            }
            let changed = {
                let mut current = self.current.lock().unwrap();
                if !current.level_of_control.can_control() {
                    return Ok(false);
                }
                let changed = current.value != config;
                current.value = config;
                changed.then(|| current.clone())
            };
            self.applied.fetch_add(1, Ordering::SeqCst);
            if let Some(live) = changed {
                let _ = self.notify.send(live);
            }
            Ok(true)
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<LiveProxySettings> {
        self.notify.subscribe()
    }
}

impl Platform for Browser {
    fn is_allowed_in_private_windows(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.private_windows_allowed.load(Ordering::SeqCst) })
    }

    fn open_options_page(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[derive(Default)]
pub struct LastView(Mutex<Option<IndicatorView>>);

impl LastView {
    pub fn get(&self) -> Option<IndicatorView> {
        self.0.lock().unwrap().clone()
    }
}

impl Indicator for LastView {
    fn render(&self, view: &IndicatorView) {
        *self.0.lock().unwrap() = Some(view.clone());
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub browser: Arc<Browser>,
    pub store: Arc<FileSettingsStore>,
    pub view: Arc<LastView>,
    pub reconciler: Arc<Reconciler>,
}

impl Fixture {
    pub fn new(live: ProxyConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let browser = Arc::new(Browser::new(live));
        Self::assemble(dir, browser)
    }

    fn assemble(dir: TempDir, browser: Arc<Browser>) -> Self {
        let store = Arc::new(FileSettingsStore::new(dir.path().join("settings.json")));
        let view = Arc::new(LastView::default());
        let reconciler = Arc::new(Reconciler::new(Collaborators {
            store: store.clone(),
            live: browser.clone(),
            platform: browser.clone(),
            indicator: view.clone(),
        }));
        Self {
            dir,
            browser,
            store,
            view,
            reconciler,
        }
    }

    /// Simulate a browser restart: fresh reconciler and store handle over
    /// the same files and the same live setting.
    pub fn restart(self) -> Self {
        let Self { dir, browser, .. } = self;
        Self::assemble(dir, browser)
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.path().join("settings.json")
    }

    /// The persisted record as raw JSON.
    pub fn record_json(&self) -> serde_json::Value {
        let bytes = std::fs::read(self.record_path()).expect("record file");
        serde_json::from_slice(&bytes).expect("record json")
    }
}

pub fn system() -> ProxyConfig {
    ProxyConfig::with_type(ProxyType::System)
}

pub fn manual(host: &str) -> ProxyConfig {
    ProxyConfig::with_type(ProxyType::Manual)
        .with("http", host)
        .with("httpProxyAll", true)
}
