//! Teardown.
//!
//! Closing removes the registry entry first and releases the instance second,
//! so a `get` that races with teardown starts a fresh epoch instead of
//! receiving the instance being closed.

use std::sync::Arc;

use agentfs_types::{AgentFsError, Result, TeardownFailure, TenantKey};
use futures::future::join_all;

use crate::instance::VirtualFilesystem;
use crate::registry::{InstanceRegistry, Slot};

impl InstanceRegistry {
    /// Close one tenant's instance and forget it.
    ///
    /// An in-flight construction is awaited first. Returns `false` when the
    /// key had no entry (or its construction failed), `true` when an instance
    /// was released.
    #[tracing::instrument(level = "info", skip(self, key), fields(tenant = %key))]
    pub async fn close(&self, key: &TenantKey) -> Result<bool> {
        let slot = self.slots.lock().await.remove(key);
        match slot {
            Some(slot) => release(slot).await,
            None => Ok(false),
        }
    }

    /// Close every instance and empty the registry.
    ///
    /// Pending constructions are awaited, then all instances are released
    /// concurrently. A failing release does not stop the others; failures are
    /// collected into `TeardownPartialFailure`. Either way the registry is
    /// empty afterwards. Returns how many instances were released.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn close_all(&self) -> Result<usize> {
        let drained: Vec<(TenantKey, Slot)> = self.slots.lock().await.drain().collect();
        if drained.is_empty() {
            return Ok(0);
        }

        let results = join_all(drained.into_iter().map(|(key, slot)| async move {
            let outcome = release(slot).await;
            (key, outcome)
        }))
        .await;

        let mut released = 0;
        let mut failures = Vec::new();
        for (key, outcome) in results {
            match outcome {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => failures.push(TeardownFailure {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            tracing::info!(released, "all filesystems closed");
            Ok(released)
        } else {
            tracing::warn!(released, failed = failures.len(), "teardown finished with failures");
            Err(AgentFsError::TeardownPartialFailure { failures })
        }
    }
}

/// Settle a removed entry and release whatever it held.
async fn release(slot: Slot) -> Result<bool> {
    let fs: Arc<VirtualFilesystem> = match slot {
        Slot::Ready(fs) => fs,
        Slot::Initializing { build, .. } => match build.await {
            Ok(fs) => fs,
            // Nothing was built, so nothing to release.
            Err(_) => return Ok(false),
        },
    };
    if fs.is_closed() {
        return Ok(false);
    }
    fs.close().await?;
    Ok(true)
}
