// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability

//! Identity assignment under concurrent object creation.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use tracer::{Core, ObjectId, SceneGroup};

#[test]
fn two_concurrent_creations_get_one_and_two() {
    for _ in 0..50 {
        let core = Arc::new(Core::new());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let core = Arc::clone(&core);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let object = core.create_object(SceneGroup::UNASSIGNED).unwrap();
                    let id = object.id();
                    // Keep the object alive until both threads are done.
                    (id, object)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ids: HashSet<u16> = results.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, HashSet::from([1, 2]));
        assert_eq!(core.registry().live_count(), 2);
    }
}

#[test]
fn random_interleavings_never_duplicate() {
    let core = Arc::new(Core::new());
    let threads = 6;
    let per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|seed| {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::with_seed(seed);
                let mut ids = Vec::with_capacity(per_thread);
                let mut held = Vec::new();
                for _ in 0..per_thread {
                    let object = core.create_object(SceneGroup::UNASSIGNED).unwrap();
                    ids.push(object.id());
                    // Randomly keep or drop objects; ids must never come back.
                    if rng.bool() {
                        held.push(object);
                    }
                    if rng.u8(..) < 8 {
                        thread::yield_now();
                    }
                }
                (ids, held.len())
            })
        })
        .collect();

    let mut all: HashSet<ObjectId> = HashSet::new();
    for handle in handles {
        let (ids, _) = handle.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing per thread");
        for id in ids {
            assert!(all.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(all.len(), threads as usize * per_thread);
    // Every object was dropped when its thread finished.
    assert_eq!(core.registry().live_count(), 0);
}

#[test]
fn live_set_follows_object_lifetime() {
    let core = Core::new();
    let group = SceneGroup::new(12).unwrap();
    let kept = core.create_object(group).unwrap();
    {
        let _temporary = core.create_object(group).unwrap();
        assert_eq!(core.registry().live_count(), 2);
    }
    assert_eq!(core.registry().live_ids(), vec![kept.id()]);
    assert_eq!(core.registry().scene_group(kept.id()), Some(group));
}
