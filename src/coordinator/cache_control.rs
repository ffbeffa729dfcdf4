//! Cancellation of in-flight fetches and cache maintenance pass-throughs.

use tokio::task::JoinHandle;

use crate::types::Event;

use super::FetchCoordinator;

impl FetchCoordinator {
    /// Request cancellation of every registered in-flight fetch
    ///
    /// Fire-and-forget: the registry is drained and each handle is passed to
    /// the store's `cancel` on a background task. Nothing waits for the
    /// store to acknowledge, and no batch's collected results are touched.
    /// Cancelled units still finish their batch through the store's
    /// completion (or the unit timeout).
    ///
    /// The returned handle resolves to the number of fetches cancelled; it
    /// can be dropped.
    pub fn cancel_all_active_downloads(&self) -> JoinHandle<usize> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let handles = coordinator.registry.drain().await;
            tracing::info!(count = handles.len(), "Cancelling active downloads");

            for handle in &handles {
                tracing::debug!(handle = %handle, "Requesting cancellation");
                coordinator.store.cancel(*handle).await;
            }

            coordinator.emit_event(Event::DownloadsCancelled {
                count: handles.len(),
            });
            handles.len()
        })
    }

    /// Apply the configured memory cost limit to the store
    ///
    /// The limit is `cache.base_dimension² × cache.scale` bytes.
    pub async fn set_cache_limit(&self) {
        self.set_cache_limit_bytes(self.config.cache.memory_cost_limit())
            .await;
    }

    /// Apply an explicit memory cost limit to the store
    pub async fn set_cache_limit_bytes(&self, bytes: u64) {
        tracing::info!(bytes, store = self.store.name(), "Setting memory cost limit");
        self.store.set_memory_cost_limit(bytes).await;
    }

    /// Remove every cached image, memory and disk
    pub async fn clear_all_cache(&self) {
        tracing::info!(store = self.store.name(), "Clearing all cache tiers");
        self.store.clear_all().await;
    }

    /// Remove every cached image from the disk tier
    pub async fn clear_disk_cache(&self) {
        tracing::info!(store = self.store.name(), "Clearing disk cache");
        self.store.clear_disk().await;
    }

    /// Remove every cached image from the memory tier
    pub async fn clear_memory_cache(&self) {
        tracing::info!(store = self.store.name(), "Clearing memory cache");
        self.store.clear_memory().await;
    }
}
