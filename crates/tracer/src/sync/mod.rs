// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter synchronisation between clients.

mod queue;
mod update;

pub use queue::{UpdateQueue, DEFAULT_QUEUE_CAPACITY};
pub use update::{
    MessageType, ParameterUpdate, UpdateMessage, MESSAGE_HEADER_SIZE, UPDATE_HEADER_SIZE,
};
