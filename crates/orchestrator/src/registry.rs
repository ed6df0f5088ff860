use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sentinel_core::{EngineConfig, EngineError, VenueAdapter, Watch, WatchEvent, WatchId};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info};

use crate::actor::WatchActor;
use crate::handle::WatchHandle;
use crate::store;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Owns the watch actors and the shared event feed.
pub struct WatchRegistry {
    watches: Arc<RwLock<HashMap<WatchId, WatchHandle>>>,
    event_tx: broadcast::Sender<WatchEvent>,
    adapter: Arc<dyn VenueAdapter>,
    config: EngineConfig,
}

impl WatchRegistry {
    #[must_use]
    pub fn new(adapter: Arc<dyn VenueAdapter>, config: EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            watches: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            adapter,
            config,
        }
    }

    /// Subscribes to the state-change event feed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.event_tx.subscribe()
    }

    /// Spawns an actor for the watch and returns its handle.
    ///
    /// # Errors
    /// Returns an error if a watch with the same id is already registered.
    pub async fn spawn_watch(&self, watch: Watch) -> Result<WatchHandle> {
        if self.watches.read().await.contains_key(&watch.id) {
            return Err(EngineError::LifecycleConflict(format!(
                "watch {} already registered",
                watch.id
            ))
            .into());
        }

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = WatchHandle::new(watch.id.clone(), tx);

        let _ = self.event_tx.send(WatchEvent::WatchCreated {
            watch: watch.clone(),
        });

        let actor = WatchActor::new(
            watch,
            rx,
            self.event_tx.clone(),
            Arc::clone(&self.adapter),
            self.config.monitor.clone(),
            self.config.ladder.clone(),
        );
        let watch_id = handle.watch_id().clone();
        tokio::spawn(actor.run());

        self.watches.write().await.insert(watch_id, handle.clone());
        Ok(handle)
    }

    #[must_use]
    pub async fn get_watch(&self, watch_id: &WatchId) -> Option<WatchHandle> {
        self.watches.read().await.get(watch_id).cloned()
    }

    #[must_use]
    pub async fn list_watches(&self) -> Vec<WatchId> {
        self.watches.read().await.keys().cloned().collect()
    }

    /// Shuts down and removes the watch actor.
    ///
    /// # Errors
    /// Returns an error if the shutdown command cannot be delivered.
    pub async fn remove_watch(&self, watch_id: &WatchId) -> Result<()> {
        let removed = self.watches.write().await.remove(watch_id);
        if let Some(handle) = removed {
            handle.shutdown().await?;
            let _ = self.event_tx.send(WatchEvent::WatchRemoved {
                watch_id: watch_id.clone(),
            });
        }
        Ok(())
    }

    /// Shuts down every registered watch actor.
    ///
    /// # Errors
    /// Returns an error if any shutdown command cannot be delivered.
    pub async fn shutdown_all(&self) -> Result<()> {
        let handles: Vec<_> = self.watches.read().await.values().cloned().collect();
        for handle in handles {
            handle.shutdown().await?;
        }
        Ok(())
    }

    /// Restores watches from the configured watch-list snapshot and spawns
    /// them. Watches keep their persisted `enabled` flag.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be read or parsed.
    pub async fn restore_watchlist(&self) -> Result<Vec<WatchId>> {
        let watches = store::load_watches(Path::new(&self.config.watchlist_path))?;
        let mut restored = Vec::new();
        for watch in watches {
            let watch_id = watch.id.clone();
            match self.spawn_watch(watch).await {
                Ok(_) => {
                    info!(watch = %watch_id, "restored watch");
                    restored.push(watch_id);
                }
                Err(e) => error!(watch = %watch_id, error = %e, "failed to restore watch"),
            }
        }
        Ok(restored)
    }

    /// Snapshots every watch's current configuration to the watch-list file.
    ///
    /// # Errors
    /// Returns an error if any actor cannot be queried or the file cannot be
    /// written.
    pub async fn save_watchlist(&self) -> Result<()> {
        let handles: Vec<_> = self.watches.read().await.values().cloned().collect();
        let mut watches = Vec::with_capacity(handles.len());
        for handle in handles {
            watches.push(handle.status().await?.watch);
        }
        watches.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        store::save_watches(Path::new(&self.config.watchlist_path), &watches)
    }

    /// Spawns the periodic account/position publisher. The task runs until
    /// aborted.
    #[must_use]
    pub fn spawn_account_task(&self) -> tokio::task::JoinHandle<()> {
        let adapter = Arc::clone(&self.adapter);
        let event_tx = self.event_tx.clone();
        let period = Duration::from_secs(self.config.monitor.account_refresh_secs);
        let deadline = Duration::from_millis(self.config.monitor.adapter_timeout_ms);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let summary =
                    tokio::time::timeout(deadline, adapter.account_summary()).await;
                let positions = tokio::time::timeout(deadline, adapter.positions()).await;
                match (summary, positions) {
                    (Ok(Ok(summary)), Ok(Ok(positions))) => {
                        let _ = event_tx.send(WatchEvent::AccountUpdate { summary, positions });
                    }
                    _ => debug!("account refresh failed, keeping last published state"),
                }
            }
        })
    }
}
