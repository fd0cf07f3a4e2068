// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity Registry for parameter objects
//!
//! Hands out process-unique object ids and tracks which objects are alive.
//!
//! # Architecture
//!
//! ```text
//! IdentityRegistry (one per Core)
//! +-- next_id: AtomicU32          (monotonic, never reset)
//! +-- live: DashMap<ObjectId, SceneGroup>
//!
//! Registration (held by ParameterObject)
//! +-- registry: Weak<IdentityRegistry>
//! +-- id: ObjectId
//! +-- [drop -> unregister]
//! ```
//!
//! # Thread Safety
//!
//! - `next_id`: single `fetch_update` on an atomic counter, no lock
//! - `live`: sharded concurrent map, registration from any thread

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Process-unique identifier of a parameter object.
///
/// Ids start at 1 and are never reused while the process runs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(u16);

impl ObjectId {
    /// Largest id the registry will hand out.
    pub const MAX: ObjectId = ObjectId(u16::MAX);

    /// Wrap a raw id (e.g. one decoded from the wire).
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene/group tag of a parameter object.
///
/// 0-253 are assigned groups, 254 means "unassigned".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SceneGroup(u8);

impl SceneGroup {
    /// Sentinel for objects not attached to any scene group.
    pub const UNASSIGNED: SceneGroup = SceneGroup(254);

    /// Highest assignable group.
    pub const MAX_ASSIGNED: u8 = 253;

    /// Validate and wrap a raw group tag.
    pub fn new(raw: u8) -> Result<Self> {
        if raw <= Self::MAX_ASSIGNED || raw == Self::UNASSIGNED.0 {
            Ok(Self(raw))
        } else {
            Err(Error::InvalidSceneGroup(raw))
        }
    }

    /// Raw tag value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// True for the unassigned sentinel.
    pub const fn is_unassigned(self) -> bool {
        self.0 == Self::UNASSIGNED.0
    }
}

impl Default for SceneGroup {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl std::fmt::Display for SceneGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unassigned() {
            write!(f, "unassigned")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Issues object ids and tracks live-object membership.
pub struct IdentityRegistry {
    /// Next id to hand out (u32 so exhaustion is observable past u16::MAX)
    next_id: AtomicU32,
    live: DashMap<ObjectId, SceneGroup>,
}

impl IdentityRegistry {
    /// Create an empty registry whose first id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            live: DashMap::new(),
        }
    }

    /// Hand out the next unused id.
    ///
    /// Strictly increasing across all threads. Returns
    /// [`Error::IdSpaceExhausted`] once `ObjectId::MAX` has been issued;
    /// the counter never wraps.
    pub fn next_id(&self) -> Result<ObjectId> {
        let max = u32::from(ObjectId::MAX.get());
        self.next_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current <= max).then_some(current + 1)
            })
            .map(|issued| ObjectId(issued as u16))
            .map_err(|_| Error::IdSpaceExhausted)
    }

    /// Add an object to the live set (replaces the group of an existing entry).
    pub fn register(&self, id: ObjectId, group: SceneGroup) {
        self.live.insert(id, group);
        log::debug!("[IdentityRegistry] registered object {} (group {})", id, group);
    }

    /// Remove an object from the live set. Removing a non-member is a no-op.
    pub fn unregister(&self, id: ObjectId) {
        if self.live.remove(&id).is_some() {
            log::debug!("[IdentityRegistry] unregistered object {}", id);
        }
    }

    /// True while the object is alive.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.live.contains_key(&id)
    }

    /// Scene group of a live object.
    pub fn scene_group(&self, id: ObjectId) -> Option<SceneGroup> {
        self.live.get(&id).map(|entry| *entry.value())
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Sorted ids of all live objects.
    pub fn live_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.live.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Drop all membership. The id counter is left untouched.
    pub fn clear(&self) {
        self.live.clear();
    }

    /// Allocate an id and register it in one step.
    pub(crate) fn enroll(self: &Arc<Self>, group: SceneGroup) -> Result<Registration> {
        let id = self.next_id()?;
        self.register(id, group);
        Ok(Registration {
            registry: Arc::downgrade(self),
            id,
        })
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("live_count", &self.live_count())
            .finish()
    }
}

/// Live-set membership of one object.
///
/// When dropped, automatically unregisters the object from its registry.
pub(crate) struct Registration {
    registry: Weak<IdentityRegistry>,
    id: ObjectId,
}

impl Registration {
    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}
