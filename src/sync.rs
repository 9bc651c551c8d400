//! Remote sync coordinator.
//!
//! A background task keeps the local [`Store`] and the learning-state
//! backend in agreement: one bootstrap fetch on startup (remote wins
//! wholesale when it has anything), then a debounced push of every local
//! change. Remote failures are logged and swallowed; the app degrades to
//! local-only and never blocks on the network.

use crate::remote::LearningStateApi;
use crate::types::LearningState;
use crate::Store;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Hard cap on remote calls for one coordinator's lifetime. `None` means
/// unlimited.
pub struct CallBudget {
    max: Option<u32>,
    used: AtomicU32,
}

impl CallBudget {
    pub fn new(max: Option<u32>) -> Self {
        Self {
            max,
            used: AtomicU32::new(0),
        }
    }

    /// Take one call from the budget. False means the budget is spent and
    /// the call must be skipped.
    pub fn consume(&self) -> bool {
        let Some(max) = self.max else {
            self.used.fetch_add(1, Ordering::Relaxed);
            return true;
        };
        let prior = self.used.fetch_add(1, Ordering::Relaxed);
        if prior >= max {
            tracing::debug!(max, "Remote call budget exhausted, skipping call");
            return false;
        }
        true
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Relaxed)
    }
}

/// Knobs for [`spawn_sync`].
pub struct SyncOptions {
    pub scope: String,
    pub debounce: Duration,
    /// Remote calls allowed for this coordinator; `None` is unlimited.
    pub max_calls: Option<u32>,
    /// Hybrid mode can bootstrap from remote while keeping writes local.
    pub push_enabled: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            scope: "global".to_string(),
            debounce: Duration::from_millis(800),
            max_calls: None,
            push_enabled: true,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &crate::config::SyncConfig) -> Self {
        Self {
            debounce: config.debounce,
            max_calls: config.max_calls,
            push_enabled: config.remote_writes_enabled(),
            ..Self::default()
        }
    }
}

/// Handle to a running coordinator. Dropping it detaches the task; `stop`
/// unregisters the store listener and ends the task.
pub struct SyncHandle {
    store: Arc<Store>,
    subscription: crate::store::SubscriptionId,
    task: tokio::task::JoinHandle<()>,
}

impl SyncHandle {
    pub fn stop(self) {
        self.store.unsubscribe(self.subscription);
        self.task.abort();
    }
}

/// Start the coordinator. Must run inside a tokio runtime.
pub fn spawn_sync(
    store: Arc<Store>,
    api: Arc<dyn LearningStateApi>,
    options: SyncOptions,
) -> SyncHandle {
    let (tx, rx) = mpsc::unbounded_channel::<LearningState>();

    // Set while applying a remote state locally, so the write we cause
    // ourselves is not echoed straight back as a push
    let suppress_next = Arc::new(AtomicBool::new(false));

    let subscription = {
        let suppress_next = Arc::clone(&suppress_next);
        store.subscribe(move |state| {
            if suppress_next.swap(false, Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(state.clone());
        })
    };

    let task = tokio::spawn(run_sync(
        Arc::clone(&store),
        api,
        options,
        suppress_next,
        rx,
    ));

    SyncHandle {
        store,
        subscription,
        task,
    }
}

async fn run_sync(
    store: Arc<Store>,
    api: Arc<dyn LearningStateApi>,
    options: SyncOptions,
    suppress_next: Arc<AtomicBool>,
    mut rx: mpsc::UnboundedReceiver<LearningState>,
) {
    let budget = CallBudget::new(options.max_calls);
    let scope = options.scope.as_str();

    // Bootstrap: the remote copy wins wholesale when it exists
    if budget.consume() {
        match api.fetch(scope).await {
            Ok(Some(record)) => {
                tracing::info!(scope, "Adopting remote learning state");
                suppress_next.store(true, Ordering::SeqCst);
                store.replace(record.state);
            }
            Ok(None) => {
                let local = store.snapshot();
                if options.push_enabled && local.has_progress() && budget.consume() {
                    tracing::info!(scope, "No remote state yet, pushing local progress");
                    if let Err(e) = api.store(scope, &local, None).await {
                        tracing::error!(scope, "Initial learning-state push failed: {}", e);
                    }
                }
            }
            Err(e) => {
                tracing::error!(scope, "Learning-state bootstrap failed: {}", e);
            }
        }
    }

    // Push loop: trailing debounce, only the latest state is ever sent
    while let Some(mut latest) = rx.recv().await {
        loop {
            tokio::select! {
                next = rx.recv() => {
                    match next {
                        Some(state) => latest = state,
                        None => break,
                    }
                }
                _ = tokio::time::sleep(options.debounce) => break,
            }
        }

        if !options.push_enabled || !budget.consume() {
            continue;
        }
        let stamp = chrono::Utc::now().to_rfc3339();
        if let Err(e) = api.store(scope, &latest, Some(&stamp)).await {
            tracing::error!(scope, "Learning-state push failed: {}", e);
        }
    }
}
