// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every TRACER component.
//!
//! Lookup misses (unknown parameter name, unknown snapshot segment) are not
//! errors: they surface as `Option::None` or an empty response.

use crate::parameter::ParameterKind;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors returned by TRACER operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Identity / parameter errors
    // ========================================================================
    /// Typed lookup found a parameter whose value type differs from the request.
    #[error("parameter '{name}' holds {found} values, not {expected}")]
    TypeMismatch {
        name: String,
        expected: ParameterKind,
        found: ParameterKind,
    },

    /// All object ids have been handed out; ids are never reused.
    #[error("object id space exhausted")]
    IdSpaceExhausted,

    /// Scene group outside 0..=253 (254 is the unassigned sentinel).
    #[error("invalid scene group {0} (must be 0-253, or 254 for unassigned)")]
    InvalidSceneGroup(u8),

    /// Parameter index not present on the addressed object.
    #[error("object {object} has no parameter at index {index}")]
    UnknownParameter { object: u16, index: u16 },

    /// Object parameter list is full (indices are u16 on the wire).
    #[error("object {0} cannot hold more parameters")]
    TooManyParameters(u16),

    // ========================================================================
    // Server lifecycle errors
    // ========================================================================
    /// Operation not allowed in the current server state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Binding the responder endpoint failed.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// One or more teardown steps failed while stopping the server.
    #[error("teardown failed: {0}")]
    Teardown(String),

    /// The server thread panicked before completing its teardown.
    #[error("distribution worker panicked")]
    WorkerPanicked,

    // ========================================================================
    // Transport / wire errors
    // ========================================================================
    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame violated the request/response protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Parameter update payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenient alias for results using the TRACER [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
