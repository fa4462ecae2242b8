//! ResourceManager - per-task registry of cleanup actions
//!
//! Resources register a cleanup action when acquired; release runs the actions
//! in reverse registration order (LIFO) to respect acquire/release symmetry.
//! A failing cleanup is logged and never stops the loop.

use std::sync::{Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::core::CoreResult;

/// A cleanup action, synchronous or asynchronous
pub enum CleanupAction {
    /// Synchronous cleanup
    Sync(Box<dyn FnOnce() -> CoreResult<()> + Send>),
    /// Asynchronous cleanup
    Async(BoxFuture<'static, CoreResult<()>>),
}

/// One registered resource awaiting cleanup
pub struct ResourceHandle {
    /// Resource identifier, used in logs
    pub id: String,
    action: CleanupAction,
}

/// Registry of cleanup actions for one task
///
/// The handle list sits behind a mutex: the boxed cleanup futures are `Send`
/// but not `Sync`, and holders of the registry must stay `Sync` so streams
/// can run on spawned tasks.
pub struct ResourceManager {
    handles: Mutex<Vec<ResourceHandle>>,
}

impl ResourceManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
        }
    }

    fn handles_mut(&mut self) -> &mut Vec<ResourceHandle> {
        self.handles.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a synchronous cleanup action
    pub fn register_sync<F>(&mut self, id: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.handles_mut().push(ResourceHandle {
            id: id.into(),
            action: CleanupAction::Sync(Box::new(cleanup)),
        });
    }

    /// Register an asynchronous cleanup action
    pub fn register_async(&mut self, id: impl Into<String>, cleanup: BoxFuture<'static, CoreResult<()>>) {
        self.handles_mut().push(ResourceHandle {
            id: id.into(),
            action: CleanupAction::Async(cleanup),
        });
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether any resources are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release all resources in reverse registration order
    ///
    /// Returns the number of cleanups that failed. Failures are logged; the
    /// loop always continues past a failing handle.
    pub async fn release_all(&mut self) -> usize {
        let mut failures = 0;

        while let Some(handle) = self.handles_mut().pop() {
            let result = match handle.action {
                CleanupAction::Sync(cleanup) => cleanup(),
                CleanupAction::Async(cleanup) => cleanup.await,
            };

            if let Err(e) = result {
                failures += 1;
                tracing::warn!(
                    resource = %handle.id,
                    error = %e,
                    "[ResourceManager] Cleanup failed, continuing"
                );
            } else {
                tracing::debug!(resource = %handle.id, "[ResourceManager] Released");
            }
        }

        failures
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("registered", &self.len())
            .finish()
    }
}
