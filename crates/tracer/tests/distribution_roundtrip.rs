// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end: scene authority -> snapshot cache -> server -> client.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracer::{
    Core, DistributionConfig, DistributionServer, SceneAuthority, SceneClient, SceneGroup,
    SceneSegments, SegmentKind, ServerState, Vector3,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serializes the number of live objects into the header segment.
struct CountingAuthority {
    core: Arc<Core>,
}

impl SceneAuthority for CountingAuthority {
    fn collect_segments(&self) -> SceneSegments {
        let live = self.core.registry().live_count() as u32;
        SceneSegments::new()
            .with("header", live.to_le_bytes().to_vec())
            .with("nodes", vec![0xAB; 64])
    }
}

fn local_config() -> DistributionConfig {
    DistributionConfig::new("127.0.0.1", 0)
        .unwrap()
        .with_poll_interval(Duration::from_millis(1))
}

#[test]
fn round_trip_known_and_unknown_segments() {
    let core = Arc::new(Core::new());
    core.snapshot_cache()
        .populate(SceneSegments::new().with("a", vec![1u8, 2, 3]));

    let server = DistributionServer::with_config(Arc::clone(core.snapshot_cache()), local_config());
    let addr = server.start().unwrap();

    let mut client = SceneClient::connect(addr, TIMEOUT).unwrap();
    assert_eq!(client.request("a").unwrap(), vec![1u8, 2, 3]);
    assert_eq!(client.request("missing").unwrap(), Vec::<u8>::new());

    server.stop().unwrap();
    server.stop().unwrap();
    assert_eq!(server.state(), ServerState::Idle);
}

#[test]
fn refreshed_snapshot_is_served_after_mutation() {
    let core = Arc::new(Core::new());
    core.register_manager(Arc::new(CountingAuthority {
        core: Arc::clone(&core),
    }));

    let mut object = core.create_object(SceneGroup::new(1).unwrap()).unwrap();
    object.add_parameter("position", Vector3::default(), true).unwrap();
    let _tracking = core.track_staleness(&object);

    core.refresh_snapshot::<CountingAuthority>().unwrap();
    let server = DistributionServer::with_config(Arc::clone(core.snapshot_cache()), local_config());
    let addr = server.start().unwrap();

    let mut client = SceneClient::connect(addr, TIMEOUT).unwrap();
    assert_eq!(client.request("header").unwrap(), 1u32.to_le_bytes());

    let _second = core.create_object(SceneGroup::new(1).unwrap()).unwrap();
    object.set_value("position", Vector3::new(0.0, 1.0, 0.0)).unwrap();
    assert!(core.snapshot_cache().is_stale());

    core.refresh_snapshot::<CountingAuthority>().unwrap();
    assert!(!core.snapshot_cache().is_stale());
    assert_eq!(client.request("header").unwrap(), 2u32.to_le_bytes());

    let scene = client.fetch_scene().unwrap();
    assert_eq!(scene.len(), 2);
    assert!(scene.get(SegmentKind::Textures.name()).is_none());
}

#[test]
fn concurrent_clients_are_all_answered() {
    let core = Core::new();
    core.snapshot_cache()
        .populate(SceneSegments::new().with("objects", vec![7u8; 4096]));
    let server = DistributionServer::with_config(Arc::clone(core.snapshot_cache()), local_config());
    let addr = server.start().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                let mut client = SceneClient::connect(addr, TIMEOUT).unwrap();
                for _ in 0..10 {
                    assert_eq!(client.request("objects").unwrap().len(), 4096);
                    assert!(client.request("characters").unwrap().is_empty());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    server.stop().unwrap();
    let stats = server.stats();
    assert_eq!(stats.requests, 80);
    assert_eq!(stats.hits, 40);
    assert_eq!(stats.peers_accepted, 4);
}
