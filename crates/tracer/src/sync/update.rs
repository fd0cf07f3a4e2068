// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter update messages exchanged between clients.
//!
//! # Wire Format
//!
//! ```text
//! UpdateMessage
//! +-----------+---------+--------------+----------------------+
//! | client_id | time    | message type | ParameterUpdate ...  |
//! | u8        | u8      | u8 (= 0)     |                      |
//! +-----------+---------+--------------+----------------------+
//!
//! ParameterUpdate
//! +-------+-------------+----------------+------+---------------+
//! | scene | object      | parameter      | kind | payload       |
//! | u8    | u16 LE      | u16 LE         | u8   | per kind      |
//! +-------+-------------+----------------+------+---------------+
//! ```
//!
//! Payloads are self-delimiting (see [`ParameterKind::payload_len`]), so
//! updates are simply concatenated.

use crate::change::ParameterChange;
use crate::core::identity::{ObjectId, SceneGroup};
use crate::error::{Error, Result};
use crate::parameter::{ParameterKind, ParameterValue};

/// Size of the fixed part of a [`ParameterUpdate`].
pub const UPDATE_HEADER_SIZE: usize = 6;

/// Size of the [`UpdateMessage`] header.
pub const MESSAGE_HEADER_SIZE: usize = 3;

/// Message type byte of the update channel.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ParameterUpdate = 0,
    Lock = 1,
    Sync = 2,
    Ping = 3,
    ResendUpdate = 4,
    UndoRedoAdd = 5,
    ResetObject = 6,
    DataHub = 7,
}

impl MessageType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(MessageType::ParameterUpdate),
            1 => Some(MessageType::Lock),
            2 => Some(MessageType::Sync),
            3 => Some(MessageType::Ping),
            4 => Some(MessageType::ResendUpdate),
            5 => Some(MessageType::UndoRedoAdd),
            6 => Some(MessageType::ResetObject),
            7 => Some(MessageType::DataHub),
            _ => None,
        }
    }
}

/// A new value for one parameter of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterUpdate {
    pub scene_group: SceneGroup,
    pub object: ObjectId,
    /// Index of the parameter within its object
    pub parameter: u16,
    pub kind: ParameterKind,
    /// Value in wire encoding
    pub payload: Vec<u8>,
}

impl ParameterUpdate {
    pub fn new<T: ParameterValue>(
        scene_group: SceneGroup,
        object: ObjectId,
        parameter: u16,
        value: &T,
    ) -> Self {
        let mut payload = Vec::new();
        value.encode(&mut payload);
        Self {
            scene_group,
            object,
            parameter,
            kind: T::KIND,
            payload,
        }
    }

    /// Capture a distributed change.
    pub fn from_change(change: &ParameterChange<'_>) -> Self {
        Self {
            scene_group: change.scene_group,
            object: change.object,
            parameter: change.index(),
            kind: change.kind(),
            payload: change.encoded_value(),
        }
    }

    /// Decode the carried value as `T`.
    pub fn value<T: ParameterValue>(&self) -> Result<T> {
        if self.kind != T::KIND {
            return Err(Error::Decode(format!(
                "update carries {} value, not {}",
                self.kind,
                T::KIND
            )));
        }
        T::decode(&self.payload)
    }

    pub fn encoded_len(&self) -> usize {
        UPDATE_HEADER_SIZE + self.payload.len()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.scene_group.get());
        buf.extend_from_slice(&self.object.get().to_le_bytes());
        buf.extend_from_slice(&self.parameter.to_le_bytes());
        buf.push(self.kind.to_byte());
        buf.extend_from_slice(&self.payload);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode one update from the start of `bytes`.
    ///
    /// Returns the update and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < UPDATE_HEADER_SIZE {
            return Err(Error::Decode(format!(
                "update header needs {} bytes, got {}",
                UPDATE_HEADER_SIZE,
                bytes.len()
            )));
        }
        let scene_group = SceneGroup::new(bytes[0])?;
        let object = ObjectId::from_raw(u16::from_le_bytes([bytes[1], bytes[2]]));
        let parameter = u16::from_le_bytes([bytes[3], bytes[4]]);
        let kind = ParameterKind::from_u8(bytes[5])
            .ok_or_else(|| Error::Decode(format!("unknown parameter kind {}", bytes[5])))?;

        let body = &bytes[UPDATE_HEADER_SIZE..];
        let len = kind.payload_len(body)?;
        let update = Self {
            scene_group,
            object,
            parameter,
            kind,
            payload: body[..len].to_vec(),
        };
        Ok((update, UPDATE_HEADER_SIZE + len))
    }
}

/// A batch of updates from one client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateMessage {
    pub client_id: u8,
    /// Sender's synchronised time tick
    pub time: u8,
    pub updates: Vec<ParameterUpdate>,
}

impl UpdateMessage {
    pub fn new(client_id: u8, time: u8) -> Self {
        Self {
            client_id,
            time,
            updates: Vec::new(),
        }
    }

    pub fn push(&mut self, update: ParameterUpdate) {
        self.updates.push(update);
    }

    pub fn encode(&self) -> Vec<u8> {
        let len = MESSAGE_HEADER_SIZE
            + self
                .updates
                .iter()
                .map(ParameterUpdate::encoded_len)
                .sum::<usize>();
        let mut buf = Vec::with_capacity(len);
        buf.push(self.client_id);
        buf.push(self.time);
        buf.push(MessageType::ParameterUpdate as u8);
        for update in &self.updates {
            update.encode_into(&mut buf);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MESSAGE_HEADER_SIZE {
            return Err(Error::Protocol("update message shorter than header".to_string()));
        }
        match MessageType::from_u8(bytes[2]) {
            Some(MessageType::ParameterUpdate) => {}
            Some(other) => {
                return Err(Error::Protocol(format!(
                    "expected parameter update, got {:?}",
                    other
                )))
            }
            None => {
                return Err(Error::Protocol(format!(
                    "unknown message type {}",
                    bytes[2]
                )))
            }
        }

        let mut message = UpdateMessage::new(bytes[0], bytes[1]);
        let mut offset = MESSAGE_HEADER_SIZE;
        while offset < bytes.len() {
            let (update, consumed) = ParameterUpdate::decode(&bytes[offset..])?;
            message.updates.push(update);
            offset += consumed;
        }
        Ok(message)
    }
}
