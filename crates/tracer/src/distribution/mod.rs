// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scene distribution over a length-framed TCP request/response channel.
//!
//! - [`DistributionServer`]: threaded responder answering segment requests
//!   from a [`SnapshotCache`](crate::SnapshotCache)
//! - [`SceneClient`]: blocking requester
//! - [`FrameCodec`]: `[u32 BE length][payload]` framing shared by both

mod client;
mod frame;
mod peer;
mod server;
mod stats;


pub use client::SceneClient;
pub use frame::{FrameCodec, FRAME_HEADER_SIZE};
pub use server::{DistributionServer, ServerState};
pub use stats::{ServerStats, ServerStatsSnapshot};
