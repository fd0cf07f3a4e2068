// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot cache of pre-serialized scene segments.
//!
//! The cache holds one immutable [`SceneSegments`] set behind an `ArcSwap`.
//! `populate` swaps the whole set in one atomic store, so a reader on the
//! distribution thread sees either the previous set or the new one, never a
//! mix. Before the first `populate` every lookup misses.

use crate::config::SEGMENT_NAMES;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The well-known scene segments, in fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Header,
    Nodes,
    Objects,
    Characters,
    Textures,
    Materials,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 6] = [
        SegmentKind::Header,
        SegmentKind::Nodes,
        SegmentKind::Objects,
        SegmentKind::Characters,
        SegmentKind::Textures,
        SegmentKind::Materials,
    ];

    /// Request name of the segment.
    pub const fn name(self) -> &'static str {
        SEGMENT_NAMES[self as usize]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Named byte segments making up one scene snapshot.
///
/// Keys are free-form; the six [`SegmentKind`] names are the ones remote
/// clients ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneSegments {
    segments: HashMap<Arc<str>, Arc<[u8]>>,
}

impl SceneSegments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment, returning the previous bytes under that name.
    pub fn insert(
        &mut self,
        name: impl Into<Arc<str>>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Option<Arc<[u8]>> {
        self.segments.insert(name.into(), bytes.into())
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<Arc<str>>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<[u8]>> {
        self.segments.get(name)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.segments.keys().map(|k| k.as_ref()).collect();
        names.sort_unstable();
        names
    }

    /// Sum of all segment sizes.
    pub fn total_bytes(&self) -> usize {
        self.segments.values().map(|bytes| bytes.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.segments
            .iter()
            .map(|(name, bytes)| (name.as_ref(), bytes.as_ref()))
    }
}

impl<N, B> FromIterator<(N, B)> for SceneSegments
where
    N: Into<Arc<str>>,
    B: Into<Arc<[u8]>>,
{
    fn from_iter<I: IntoIterator<Item = (N, B)>>(iter: I) -> Self {
        let mut segments = SceneSegments::new();
        for (name, bytes) in iter {
            segments.insert(name, bytes);
        }
        segments
    }
}

/// The owner of authoritative scene data.
///
/// Serializes the current scene into segments on request; the byte layout of
/// each segment is its own business.
pub trait SceneAuthority: Send + Sync {
    fn collect_segments(&self) -> SceneSegments;
}

/// Atomically replaceable set of scene segments.
pub struct SnapshotCache {
    segments: ArcSwap<SceneSegments>,
    /// Number of completed populations (0 = never populated)
    epoch: AtomicU64,
    stale: AtomicBool,
}

impl SnapshotCache {
    /// Empty, never-populated cache.
    pub fn new() -> Self {
        Self {
            segments: ArcSwap::from_pointee(SceneSegments::new()),
            epoch: AtomicU64::new(0),
            stale: AtomicBool::new(false),
        }
    }

    /// Replace the full segment set. Returns the new epoch.
    ///
    /// The stale flag is left as is: only [`refresh_from`](Self::refresh_from)
    /// knows which mutations the new segments include.
    pub fn populate(&self, segments: SceneSegments) -> u64 {
        let count = segments.len();
        let bytes = segments.total_bytes();
        self.segments.store(Arc::new(segments));
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "[SnapshotCache] populated epoch {} ({} segments, {} bytes)",
            epoch,
            count,
            bytes
        );
        epoch
    }

    /// Cached bytes for `name`, or `None` on a miss.
    pub fn lookup(&self, name: &str) -> Option<Arc<[u8]>> {
        self.segments.load().get(name).cloned()
    }

    /// The whole current segment set.
    pub fn snapshot(&self) -> Arc<SceneSegments> {
        self.segments.load_full()
    }

    /// Flag the cached segments as out of date with the scene.
    pub fn mark_stale(&self) {
        if !self.stale.swap(true, Ordering::AcqRel) {
            log::trace!("[SnapshotCache] marked stale");
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_populated(&self) -> bool {
        self.epoch() > 0
    }

    /// Repopulate from `authority`. Returns the new epoch.
    ///
    /// The stale flag is cleared before collecting, so a mutation marked
    /// while the authority serializes keeps the cache stale.
    pub fn refresh_from(&self, authority: &dyn SceneAuthority) -> u64 {
        self.stale.store(false, Ordering::Release);
        self.populate(authority.collect_segments())
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("epoch", &self.epoch())
            .field("stale", &self.is_stale())
            .field("segments", &self.segments.load().names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lookup_misses_before_populate() {
        let cache = SnapshotCache::new();
        assert!(!cache.is_populated());
        for kind in SegmentKind::ALL {
            assert!(cache.lookup(kind.name()).is_none());
        }
    }

    #[test]
    fn test_populate_then_lookup() {
        let cache = SnapshotCache::new();
        let epoch = cache.populate(
            SceneSegments::new()
                .with("header", vec![0xAAu8])
                .with("nodes", vec![1u8, 2, 3]),
        );
        assert_eq!(epoch, 1);
        assert_eq!(cache.lookup("header").as_deref(), Some(&[0xAAu8][..]));
        assert_eq!(cache.lookup("nodes").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(cache.lookup("textures").is_none());
    }

    #[test]
    fn test_populate_replaces_whole_set() {
        let cache = SnapshotCache::new();
        cache.populate(SceneSegments::new().with("header", vec![1u8]));
        cache.populate(SceneSegments::new().with("nodes", vec![2u8]));
        assert!(cache.lookup("header").is_none());
        assert_eq!(cache.epoch(), 2);
    }

    #[test]
    fn test_readers_never_see_mixed_sets() {
        let cache = Arc::new(SnapshotCache::new());
        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..200u8 {
                    cache.populate(
                        SceneSegments::new()
                            .with("header", vec![i])
                            .with("nodes", vec![i]),
                    );
                }
            })
        };

        for _ in 0..2000 {
            let set = cache.snapshot();
            if let (Some(h), Some(n)) = (set.get("header"), set.get("nodes")) {
                assert_eq!(h, n);
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_segment_kind_names() {
        assert_eq!(SegmentKind::Header.name(), "header");
        assert_eq!(SegmentKind::from_name("materials"), Some(SegmentKind::Materials));
        assert_eq!(SegmentKind::from_name("unknown"), None);
    }

    struct EmptyScene;

    impl SceneAuthority for EmptyScene {
        fn collect_segments(&self) -> SceneSegments {
            SceneSegments::new()
        }
    }

    /// Marks the cache stale while it is being serialized.
    struct MutatingScene {
        cache: Arc<SnapshotCache>,
    }

    impl SceneAuthority for MutatingScene {
        fn collect_segments(&self) -> SceneSegments {
            let segments = SceneSegments::new().with("header", vec![1u8]);
            self.cache.mark_stale();
            segments
        }
    }

    #[test]
    fn test_refresh_clears_stale_flag() {
        let cache = SnapshotCache::new();
        cache.mark_stale();
        assert!(cache.is_stale());
        cache.refresh_from(&EmptyScene);
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_populate_keeps_stale_flag() {
        let cache = SnapshotCache::new();
        cache.mark_stale();
        cache.populate(SceneSegments::new());
        assert!(cache.is_stale());
    }

    #[test]
    fn test_mutation_during_refresh_keeps_cache_stale() {
        let cache = Arc::new(SnapshotCache::new());
        let scene = MutatingScene {
            cache: Arc::clone(&cache),
        };

        assert_eq!(cache.refresh_from(&scene), 1);
        assert!(cache.is_stale());
        assert_eq!(cache.lookup("header").as_deref(), Some(&[1u8][..]));
    }
}
