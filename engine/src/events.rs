//! Event routing from host notifications to reconciler handlers.

use std::sync::Arc;

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::mpsc;
use tracing::{error, warn};

use quickproxy_types::{LiveProxySettings, StorageChange};

use crate::error::ReconcileError;
use crate::reconciler::Reconciler;

/// Everything the host can deliver to the reconciler.
#[derive(Debug, Clone)]
pub enum Event {
    /// Extension installed or browser started.
    Init,
    ActionClicked,
    LiveProxyChanged(LiveProxySettings),
    StorageChanged(StorageChange),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Event::Init => "init",
            Event::ActionClicked => "action_clicked",
            Event::LiveProxyChanged(_) => "live_proxy_changed",
            Event::StorageChanged(_) => "storage_changed",
        }
    }
}

/// Run the handler for `event`.
pub async fn dispatch(reconciler: &Reconciler, event: Event) -> Result<(), ReconcileError> {
    match event {
        Event::Init => reconciler.init().await.map(|_| ()),
        Event::ActionClicked => reconciler.on_action_clicked().await.map(|_| ()),
        Event::LiveProxyChanged(live) => reconciler.on_live_proxy_changed(live).await,
        Event::StorageChanged(change) => reconciler.on_storage_changed(change).await,
    }
}

/// Subscriptions to the store and the live subsystem, feeding one reconciler.
pub struct EventPump {
    reconciler: Arc<Reconciler>,
    storage: broadcast::Receiver<StorageChange>,
    live: broadcast::Receiver<LiveProxySettings>,
}

impl EventPump {
    /// Subscribe to the reconciler's collaborators. Only changes made after
    /// this call are delivered.
    #[must_use]
    pub fn subscribe(reconciler: Arc<Reconciler>) -> Self {
        let storage = reconciler.store().subscribe();
        let live = reconciler.live().subscribe();
        Self {
            reconciler,
            storage,
            live,
        }
    }

    #[must_use]
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Handle queued notifications one at a time until none are left,
    /// including the ones the handlers themselves cause.
    ///
    /// Returns how many notifications were handled. Handler errors are logged.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0usize;
        loop {
            let event = if let Some(change) = next_queued(&mut self.storage, "storage") {
                Event::StorageChanged(change)
            } else if let Some(live) = next_queued(&mut self.live, "live_proxy") {
                Event::LiveProxyChanged(live)
            } else {
                break;
            };

            let name = event.name();
            if let Err(e) = dispatch(&self.reconciler, event).await {
                error!(event = name, "Event handler failed: {e}");
            }
            handled = handled.saturating_add(1);
        }
        handled
    }

    /// Deliver notifications and host `commands` until the command channel
    /// closes. Each event is handled on its own task, so handlers interleave
    /// the way browser callbacks do.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Event>) {
        loop {
            let event = tokio::select! {
                command = commands.recv() => match command {
                    Some(event) => event,
                    None => break,
                },
                change = self.storage.recv() => match change {
                    Ok(change) => Event::StorageChanged(change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(source = "storage", skipped, "Dropped change notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                live = self.live.recv() => match live {
                    Ok(live) => Event::LiveProxyChanged(live),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(source = "live_proxy", skipped, "Dropped change notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let reconciler = Arc::clone(&self.reconciler);
            tokio::spawn(async move {
                let name = event.name();
                if let Err(e) = dispatch(&reconciler, event).await {
                    error!(event = name, "Event handler failed: {e}");
                }
            });
        }
    }
}

fn next_queued<T: Clone>(rx: &mut broadcast::Receiver<T>, source: &'static str) -> Option<T> {
    loop {
        match rx.try_recv() {
            Ok(value) => return Some(value),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(source, skipped, "Dropped change notifications");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}
