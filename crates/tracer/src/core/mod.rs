// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process context shared by parameter objects and the distribution layer.
//!
//! A [`Core`] bundles the identity registry, the snapshot cache and a typed
//! manager table. Pass one explicitly to [`ParameterObject::new`], or use
//! [`Core::global`], which is created on first access and never rebound.
//!
//! [`ParameterObject::new`]: crate::ParameterObject::new

pub mod identity;

use crate::change::Subscription;
use crate::error::{Error, Result};
use crate::object::ParameterObject;
use crate::snapshot::{SceneAuthority, SnapshotCache};
use dashmap::DashMap;
use identity::{IdentityRegistry, SceneGroup};
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

static GLOBAL_CORE: OnceLock<Core> = OnceLock::new();

/// Process context: identity registry, snapshot cache and managers.
pub struct Core {
    registry: Arc<IdentityRegistry>,
    snapshot: Arc<SnapshotCache>,
    managers: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Core {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(IdentityRegistry::new()),
            snapshot: Arc::new(SnapshotCache::new()),
            managers: DashMap::new(),
        }
    }

    /// Process-wide core, initialised on first use.
    pub fn global() -> &'static Core {
        GLOBAL_CORE.get_or_init(|| {
            log::debug!("[Core] process-wide core initialised");
            Core::new()
        })
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub(crate) fn registry_arc(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    /// Cache shared with distribution servers.
    pub fn snapshot_cache(&self) -> &Arc<SnapshotCache> {
        &self.snapshot
    }

    /// Create and register a new parameter object.
    pub fn create_object(&self, scene_group: SceneGroup) -> Result<ParameterObject> {
        ParameterObject::new(self, scene_group)
    }

    /// Register a manager, replacing any previous one of the same type.
    ///
    /// Returns `true` if a manager of that type was already present.
    pub fn register_manager<T: Any + Send + Sync>(&self, manager: Arc<T>) -> bool {
        let replaced = self
            .managers
            .insert(TypeId::of::<T>(), manager as Arc<dyn Any + Send + Sync>)
            .is_some();
        log::debug!(
            "[Core] registered manager {} (replaced={})",
            std::any::type_name::<T>(),
            replaced
        );
        replaced
    }

    /// Manager of type `T`, if one is registered.
    pub fn manager<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let manager = self
            .managers
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(entry.value()))?;
        manager.downcast::<T>().ok()
    }

    /// Mark the snapshot cache stale whenever a distributed parameter of
    /// `object` changes. Drop the returned handle to stop tracking.
    pub fn track_staleness(&self, object: &ParameterObject) -> Subscription {
        let cache = Arc::clone(&self.snapshot);
        object.subscribe(move |_| cache.mark_stale())
    }

    /// Repopulate the snapshot cache from the registered scene authority `A`.
    ///
    /// Returns the new cache epoch.
    pub fn refresh_snapshot<A: SceneAuthority + Any + Send + Sync>(&self) -> Result<u64> {
        let authority = self.manager::<A>().ok_or_else(|| {
            Error::InvalidState(format!(
                "no scene authority of type {} registered",
                std::any::type_name::<A>()
            ))
        })?;
        Ok(self.snapshot.refresh_from(authority.as_ref()))
    }

    /// Clear live-object membership and managers.
    ///
    /// The id counter is kept: ids issued before shutdown are never reissued.
    pub fn shutdown(&self) {
        let live = self.registry.live_count();
        self.registry.clear();
        self.managers.clear();
        log::info!("[Core] shutdown, released {} live objects", live);
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("registry", &self.registry)
            .field("snapshot_epoch", &self.snapshot.epoch())
            .field("managers", &self.managers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Vector3;
    use crate::snapshot::SceneSegments;

    struct FixedScene;

    impl SceneAuthority for FixedScene {
        fn collect_segments(&self) -> SceneSegments {
            SceneSegments::new().with("header", vec![1u8, 2])
        }
    }

    #[test]
    fn test_global_core_is_stable() {
        let a = Core::global() as *const Core;
        let b = Core::global() as *const Core;
        assert_eq!(a, b);
    }

    #[test]
    fn test_manager_lookup_by_type() {
        let core = Core::new();
        assert!(core.manager::<FixedScene>().is_none());
        assert!(!core.register_manager(Arc::new(FixedScene)));
        assert!(core.manager::<FixedScene>().is_some());
        assert!(core.manager::<String>().is_none());
    }

    #[test]
    fn test_refresh_snapshot_requires_authority() {
        let core = Core::new();
        assert!(core.refresh_snapshot::<FixedScene>().is_err());

        core.register_manager(Arc::new(FixedScene));
        assert_eq!(core.refresh_snapshot::<FixedScene>().unwrap(), 1);
        assert_eq!(
            core.snapshot_cache().lookup("header").as_deref(),
            Some(&[1u8, 2][..])
        );
    }

    #[test]
    fn test_staleness_tracking() {
        let core = Core::new();
        core.snapshot_cache().populate(SceneSegments::new());
        let mut obj = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        obj.add_parameter("position", Vector3::default(), true).unwrap();
        obj.add_parameter("local", 0i32, false).unwrap();

        let tracking = core.track_staleness(&obj);
        obj.set_value("local", 1i32).unwrap();
        assert!(!core.snapshot_cache().is_stale());

        obj.set_value("position", Vector3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(core.snapshot_cache().is_stale());

        drop(tracking);
        core.snapshot_cache().refresh_from(&FixedScene);
        obj.set_value("position", Vector3::default()).unwrap();
        assert!(!core.snapshot_cache().is_stale());
    }

    #[test]
    fn test_shutdown_keeps_id_counter() {
        let core = Core::new();
        let first = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        let first_id = first.id();
        core.shutdown();
        assert_eq!(core.registry().live_count(), 0);

        let second = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        assert!(second.id() > first_id);
        drop(first);
        assert!(core.registry().contains(second.id()));
    }
}
