// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # TRACER - scene parameter identity and distribution
//!
//! Keeps a live graph of uniquely identified, observable parameters attached
//! to scene entities, propagates value changes to local and remote observers,
//! and serves pre-serialized scene snapshots to remote peers on demand.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracer::{Core, DistributionServer, SceneGroup, SceneSegments, Vector3};
//!
//! fn main() -> tracer::Result<()> {
//!     let core = Core::new();
//!
//!     // Objects get their id at creation and leave the live set on drop.
//!     let mut light = core.create_object(SceneGroup::new(0)?)?;
//!     light.add_parameter("position", Vector3::default(), true)?;
//!     let _stale = core.track_staleness(&light);
//!
//!     light.set_value("position", Vector3::new(0.0, 2.0, 0.0))?;
//!
//!     // Serve the current snapshot.
//!     core.snapshot_cache()
//!         .populate(SceneSegments::new().with("header", vec![0u8; 16]));
//!     let server = DistributionServer::new(Arc::clone(core.snapshot_cache()));
//!     server.configure("0.0.0.0", tracer::config::DEFAULT_DISTRIBUTION_PORT)?;
//!     server.start()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Core (explicit context, or Core::global())                        |
//! |   IdentityRegistry | SnapshotCache | managers by type              |
//! +---------------------------------------------------------------------+
//! |  ParameterObject -> Parameter<T> ... (ordered store)               |
//! |   set_value -> parameter listeners -> ChangeBus (if distribute)    |
//! +---------------------------------------------------------------------+
//! |  ChangeBus subscribers: staleness tracker, UpdateQueue, app code   |
//! +---------------------------------------------------------------------+
//! |  DistributionServer thread <-- SnapshotCache <-- SceneAuthority    |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`core`] - process context and identity registry
//! - [`parameter`] - typed parameters and value kinds
//! - [`change`] - change events and subscriptions
//! - [`snapshot`] - snapshot cache and scene authority
//! - [`distribution`] - segment server and client
//! - [`sync`] - parameter update messages
//! - [`config`] - constants and server configuration

pub mod change;
pub mod config;
pub mod core;
pub mod distribution;
pub mod error;
pub mod object;
pub mod parameter;
pub mod snapshot;
pub mod sync;

pub use change::{ChangeBus, ParameterChange, Subscription};
pub use config::DistributionConfig;
pub use core::identity::{IdentityRegistry, ObjectId, SceneGroup};
pub use core::Core;
pub use distribution::{
    DistributionServer, SceneClient, ServerState, ServerStats, ServerStatsSnapshot,
};
pub use error::{Error, Result};
pub use object::ParameterObject;
pub use parameter::{
    AbstractParameter, Color, Parameter, ParameterKind, ParameterValue, Quaternion, Vector2,
    Vector3, Vector4,
};
pub use snapshot::{SceneAuthority, SceneSegments, SegmentKind, SnapshotCache};
pub use sync::{ParameterUpdate, UpdateMessage, UpdateQueue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
