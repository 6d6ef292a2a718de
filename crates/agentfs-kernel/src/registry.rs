//! The instance registry.
//!
//! One [`VirtualFilesystem`] per [`TenantKey`], built lazily and shared by
//! every caller that asks for that key.
//!
//! # Lazy construction
//!
//! ```text
//!   get(k) ──lock──▶ Ready(fs)            ──▶ return fs
//!                 ├▶ Initializing(build)  ──▶ await the same build
//!                 └▶ absent: insert Initializing(build) then unlock,
//!                            await build
//!   build ok   ──lock──▶ Initializing → Ready   (same epoch only)
//!   build err  ──lock──▶ entry removed          (same epoch only)
//! ```
//!
//! Checking for an entry and publishing the in-flight marker happen under one
//! lock acquisition with no await in between, so two callers can never both
//! decide to build. The build itself runs outside the lock as a
//! [`Shared`] future: every waiter polls the same construction and gets a
//! clone of its result, failure included.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agentfs_types::{AgentFsError, Result, TenantKey};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use crate::config::AgentFsConfig;
use crate::factory::{FilesystemFactory, MemoryFactory};
use crate::instance::VirtualFilesystem;

pub(crate) type Build = Shared<BoxFuture<'static, Result<Arc<VirtualFilesystem>>>>;

/// What the registry holds for a key.
pub(crate) enum Slot {
    Initializing { epoch: u64, build: Build },
    Ready(Arc<VirtualFilesystem>),
}

impl Slot {
    /// `None` for a Ready slot whose instance was closed through a handle;
    /// `get` treats that slot as absent.
    fn state(&self) -> Option<EntryState> {
        match self {
            Slot::Initializing { .. } => Some(EntryState::Initializing),
            Slot::Ready(fs) if fs.is_closed() => None,
            Slot::Ready(_) => Some(EntryState::Ready),
        }
    }
}

/// Observable state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// A construction is in flight.
    Initializing,
    /// The instance is built and cached.
    Ready,
}

/// Process-wide cache enforcing one filesystem instance per tenant.
///
/// Construct one at startup and pass it (usually as `Arc<InstanceRegistry>`)
/// to whatever needs filesystem access. Call
/// [`close_all`](InstanceRegistry::close_all) at shutdown or between tests.
pub struct InstanceRegistry {
    factory: Arc<dyn FilesystemFactory>,
    pub(crate) slots: Mutex<HashMap<TenantKey, Slot>>,
    next_epoch: AtomicU64,
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("factory", &self.factory.kind())
            .field("next_epoch", &self.next_epoch.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl InstanceRegistry {
    /// Create a registry that builds backends with `factory`.
    pub fn new(factory: Arc<dyn FilesystemFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Create a registry whose tenants live in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFactory))
    }

    /// Create a registry from configuration.
    pub fn from_config(config: &AgentFsConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.storage.factory()?))
    }

    /// The default tenant's filesystem, built on first use.
    pub async fn get_default(&self) -> Result<Arc<VirtualFilesystem>> {
        self.get(&TenantKey::Default).await
    }

    /// A named tenant's filesystem, built on first use.
    ///
    /// Fails with `InvalidTenantKey` for an empty id.
    pub async fn get_for_tenant(&self, id: &str) -> Result<Arc<VirtualFilesystem>> {
        let key = TenantKey::tenant(id)?;
        self.get(&key).await
    }

    /// The filesystem for `key`, built on first use.
    ///
    /// Concurrent callers for the same key share one construction and receive
    /// the same `Arc`. A failed construction is reported to all of them and
    /// forgotten, so the next call tries again.
    #[tracing::instrument(level = "debug", skip(self, key), fields(tenant = %key))]
    pub async fn get(&self, key: &TenantKey) -> Result<Arc<VirtualFilesystem>> {
        key.validate()?;
        let (epoch, build) = {
            let mut slots = self.slots.lock().await;
            let in_flight = match slots.get(key) {
                Some(Slot::Ready(fs)) if !fs.is_closed() => {
                    tracing::trace!("cache hit");
                    return Ok(Arc::clone(fs));
                }
                Some(Slot::Initializing { epoch, build }) => Some((*epoch, build.clone())),
                // Absent, or Ready but closed through a handle.
                _ => None,
            };
            match in_flight {
                Some((epoch, build)) => {
                    tracing::debug!(epoch, "joining in-flight construction");
                    (epoch, build)
                }
                None => {
                    let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
                    let build = self.start_build(key.clone(), epoch);
                    slots.insert(
                        key.clone(),
                        Slot::Initializing {
                            epoch,
                            build: build.clone(),
                        },
                    );
                    (epoch, build)
                }
            }
        };

        let outcome = build.await;
        self.settle(key, epoch, &outcome).await;
        outcome
    }

    /// Wrap one factory call in a shareable future.
    fn start_build(&self, key: TenantKey, epoch: u64) -> Build {
        let factory = Arc::clone(&self.factory);
        async move {
            tracing::debug!(tenant = %key, epoch, factory = factory.kind(), "constructing filesystem");
            match factory.create(&key, epoch).await {
                Ok(backend) => {
                    tracing::debug!(tenant = %key, epoch, "filesystem ready");
                    Ok(Arc::new(VirtualFilesystem::new(key, epoch, backend)))
                }
                Err(e) => {
                    tracing::warn!(tenant = %key, epoch, error = %e, "filesystem construction failed");
                    Err(AgentFsError::ConstructionFailed {
                        key: key.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Publish the outcome of a build, if its marker is still the current one.
    ///
    /// Every waiter calls this; only the first one to arrive changes anything.
    /// A marker that was already removed (by `close`) or replaced (by a newer
    /// epoch) is left alone.
    async fn settle(&self, key: &TenantKey, epoch: u64, outcome: &Result<Arc<VirtualFilesystem>>) {
        let mut slots = self.slots.lock().await;
        let current = matches!(
            slots.get(key),
            Some(Slot::Initializing { epoch: e, .. }) if *e == epoch
        );
        if !current {
            return;
        }
        match outcome {
            Ok(fs) => {
                slots.insert(key.clone(), Slot::Ready(Arc::clone(fs)));
            }
            Err(_) => {
                slots.remove(key);
            }
        }
    }

    /// True only when the default tenant's instance is built and cached.
    pub async fn has_default(&self) -> bool {
        matches!(self.state(&TenantKey::Default).await, Some(EntryState::Ready))
    }

    /// Number of named (non-default) tenants that are built or being built.
    pub async fn count_tenants(&self) -> usize {
        let slots = self.slots.lock().await;
        slots
            .iter()
            .filter(|(k, slot)| !k.is_default() && slot.state().is_some())
            .count()
    }

    /// State of the entry for `key`, if any.
    pub async fn state(&self, key: &TenantKey) -> Option<EntryState> {
        let slots = self.slots.lock().await;
        slots.get(key).and_then(Slot::state)
    }

    /// Ids of named tenants with a live entry, sorted.
    pub async fn tenants(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.state().is_some())
            .filter_map(|(k, _)| k.id().map(str::to_string))
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{Filesystem, MemoryFs};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Counts builds and can hold them until released.
    #[derive(Default)]
    struct GatedFactory {
        builds: AtomicUsize,
        gate: Notify,
        gated: bool,
    }

    #[async_trait]
    impl FilesystemFactory for GatedFactory {
        async fn create(&self, _key: &TenantKey, _epoch: u64) -> io::Result<Box<dyn Filesystem>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.gate.notified().await;
            }
            Ok(Box::new(MemoryFs::new()))
        }

        fn kind(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn same_key_returns_same_instance() {
        let registry = InstanceRegistry::in_memory();
        let a = registry.get_for_tenant("user-1").await.unwrap();
        let b = registry.get_for_tenant("user-1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let d1 = registry.get_default().await.unwrap();
        let d2 = registry.get_default().await.unwrap();
        assert!(Arc::ptr_eq(&d1, &d2));
        assert!(!Arc::ptr_eq(&a, &d1));
    }

    #[tokio::test]
    async fn empty_tenant_id_is_rejected() {
        let registry = InstanceRegistry::in_memory();
        let err = registry.get_for_tenant("").await.unwrap_err();
        assert!(matches!(err, AgentFsError::InvalidTenantKey { .. }));
        assert_eq!(registry.count_tenants().await, 0);
    }

    #[tokio::test]
    async fn initializing_entry_counts_but_is_not_ready() {
        let factory = Arc::new(GatedFactory {
            gated: true,
            ..Default::default()
        });
        let registry = Arc::new(InstanceRegistry::new(factory.clone()));

        let default_task = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.get_default().await }
        });
        let tenant_task = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.get_for_tenant("user-1").await }
        });

        // Let both tasks reach the factory.
        while factory.builds.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            registry.state(&TenantKey::Default).await,
            Some(EntryState::Initializing)
        );
        assert!(!registry.has_default().await);
        assert_eq!(registry.count_tenants().await, 1);
        assert_eq!(registry.tenants().await, vec!["user-1".to_string()]);

        factory.gate.notify_waiters();
        default_task.await.unwrap().unwrap();
        tenant_task.await.unwrap().unwrap();

        assert!(registry.has_default().await);
        assert_eq!(registry.count_tenants().await, 1);
    }

    #[tokio::test]
    async fn handle_closed_directly_is_rebuilt() {
        let registry = InstanceRegistry::in_memory();
        let first = registry.get_for_tenant("user-1").await.unwrap();
        first.write_file("a", "1").await.unwrap();
        first.close().await.unwrap();

        let second = registry.get_for_tenant("user-1").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.epoch() > first.epoch());
        assert!(second.read_file("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn queries_skip_handles_closed_directly() {
        let registry = InstanceRegistry::in_memory();
        let default = registry.get_default().await.unwrap();
        let tenant = registry.get_for_tenant("user-1").await.unwrap();

        default.close().await.unwrap();
        tenant.close().await.unwrap();

        assert!(!registry.has_default().await);
        assert_eq!(registry.count_tenants().await, 0);
        assert_eq!(registry.state(&TenantKey::Default).await, None);
        assert!(registry.tenants().await.is_empty());

        registry.get_for_tenant("user-1").await.unwrap();
        assert_eq!(registry.count_tenants().await, 1);
    }

    #[tokio::test]
    async fn raw_empty_tenant_variant_is_rejected() {
        let factory = Arc::new(GatedFactory::default());
        let registry = InstanceRegistry::new(factory.clone());

        let err = registry
            .get(&TenantKey::Tenant(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentFsError::InvalidTenantKey { .. }));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
        assert_eq!(registry.count_tenants().await, 0);
    }
}
