//! Registry of in-flight fetch handles

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::TaskHandle;

/// Set of task handles whose fetch-and-store has not completed
///
/// Shared by every batch of a coordinator so that
/// `cancel_all_active_downloads` reaches fetches from all of them. All
/// operations are serialized behind one mutex.
#[derive(Clone, Default)]
pub struct ActiveTaskRegistry {
    handles: Arc<Mutex<HashSet<TaskHandle>>>,
}

impl ActiveTaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a handle; returns false if it was already tracked
    pub async fn add(&self, handle: TaskHandle) -> bool {
        self.handles.lock().await.insert(handle)
    }

    /// Stop tracking a handle; removing an absent handle is a no-op
    pub async fn remove(&self, handle: TaskHandle) -> bool {
        self.handles.lock().await.remove(&handle)
    }

    /// Whether a handle is tracked
    pub async fn contains(&self, handle: TaskHandle) -> bool {
        self.handles.lock().await.contains(&handle)
    }

    /// Number of tracked handles
    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// True if no handle is tracked
    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }

    /// Take every tracked handle, leaving the registry empty
    pub async fn drain(&self) -> Vec<TaskHandle> {
        self.handles.lock().await.drain().collect()
    }
}
