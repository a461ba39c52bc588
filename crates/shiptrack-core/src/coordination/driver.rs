//! Single-flight synchronization driver
//!
//! Every trigger (manual, timer, CLI) goes through [`SyncDriver::request_refresh`].
//! Batches hold an async mutex for their whole duration so overlapping
//! requests queue instead of interleaving, and items inside a batch are
//! refreshed one after another to stay under the API rate limit.

use crate::coordination::resolver::{RefreshOutcome, WorkItemResolver};
use crate::coordination::signals::NotificationPrefs;
use crate::error::{Error, Result};
use crate::store::WorkItemStore;
use crate::traits::{HostingApi, Notifier};
use crate::types::{SourceRepoConfig, WorkItem};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which items a refresh covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    All,
    Item(Uuid),
}

/// Resolver inputs that can change between batches
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub source_repos: Vec<SourceRepoConfig>,
    pub notifications: NotificationPrefs,
}

/// Aggregate of one batch
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub outcomes: Vec<(Uuid, RefreshOutcome)>,
}

impl RefreshSummary {
    pub fn refreshed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_ok()).count()
    }

    pub fn events(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.events.len()).sum()
    }
}

/// Owns the work-item collection and serializes refreshes over it
pub struct SyncDriver<H> {
    api: Arc<H>,
    notifier: Arc<dyn Notifier>,
    config: RwLock<DriverConfig>,
    items: RwLock<Vec<WorkItem>>,
    store: Option<WorkItemStore>,
    batch_gate: tokio::sync::Mutex<()>,
    save_lock: Mutex<()>,
}

impl<H: HostingApi> SyncDriver<H> {
    /// In-memory driver
    pub fn new(api: Arc<H>, notifier: Arc<dyn Notifier>, config: DriverConfig) -> Self {
        Self {
            api,
            notifier,
            config: RwLock::new(config),
            items: RwLock::new(Vec::new()),
            store: None,
            batch_gate: tokio::sync::Mutex::new(()),
            save_lock: Mutex::new(()),
        }
    }

    /// Load items from `store` and persist every change back to it
    pub fn with_store(mut self, store: WorkItemStore) -> Result<Self> {
        *self.items.get_mut() = store.load()?;
        self.store = Some(store);
        Ok(self)
    }

    pub fn set_config(&self, config: DriverConfig) {
        *self.config.write() = config;
    }

    /// Snapshot of all items
    pub fn items(&self) -> Vec<WorkItem> {
        self.items.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<WorkItem> {
        self.items.read().iter().find(|item| item.id == id).cloned()
    }

    /// Start tracking an item
    pub fn add_item(&self, item: WorkItem) -> Result<Uuid> {
        let id = item.id;
        self.items.write().push(item);
        self.persist()?;
        Ok(id)
    }

    /// Record the PR opened by a release pipeline
    pub fn record_deployment_pr(&self, id: Uuid, url: &str) -> Result<()> {
        {
            let mut items = self.items.write();
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| Error::NotFound(format!("work item {}", id)))?;
            item.deployment_pr_url = Some(url.to_string());
            item.touch();
        }
        self.persist()
    }

    /// Run one batch; waits for any batch already in flight.
    pub async fn request_refresh(&self, scope: RefreshScope) -> Result<RefreshSummary> {
        let _gate = self.batch_gate.lock().await;

        let ids: Vec<Uuid> = match scope {
            RefreshScope::All => self.items.read().iter().map(|item| item.id).collect(),
            RefreshScope::Item(id) => {
                if self.get(id).is_none() {
                    return Err(Error::NotFound(format!("work item {}", id)));
                }
                vec![id]
            }
        };

        let config = self.config.read().clone();
        let resolver = WorkItemResolver::new(
            self.api.as_ref(),
            self.notifier.as_ref(),
            &config.source_repos,
            config.notifications,
        );

        let mut summary = RefreshSummary::default();
        for id in ids {
            // Removed while the batch was running
            let Some(mut item) = self.get(id) else {
                continue;
            };

            let outcome = resolver.refresh(&mut item).await;
            // Other fields may have changed while the refresh was awaiting
            if let Some(slot) = self.items.write().iter_mut().find(|slot| slot.id == id) {
                slot.apply_sync(&item);
            }
            summary.outcomes.push((id, outcome));
        }

        self.persist()?;
        info!(
            refreshed = summary.refreshed(),
            failed = summary.failed(),
            events = summary.events(),
            "Refresh complete"
        );
        Ok(summary)
    }

    fn persist(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.save_lock.lock();
        let snapshot = self.items.read().clone();
        store.save(&snapshot)
    }
}

impl<H: HostingApi + 'static> SyncDriver<H> {
    /// Refresh everything every `interval` until the handle is aborted.
    ///
    /// The first batch runs immediately; a slow batch delays later ticks
    /// rather than bunching them.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Periodic refresh");
                if let Err(e) = self.request_refresh(RefreshScope::All).await {
                    warn!(error = %e, "Periodic refresh failed");
                }
            }
        })
    }
}
