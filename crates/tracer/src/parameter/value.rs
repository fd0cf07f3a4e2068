// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter value kinds and their wire encoding.
//!
//! All multi-byte values are little-endian. Strings carry a u16 LE length
//! prefix so a payload is always self-delimiting:
//!
//! ```text
//! Bool       1 byte (0/1)
//! Int        4 bytes i32
//! Float      4 bytes f32
//! Vector2    2 x f32
//! Vector3    3 x f32
//! Vector4    4 x f32
//! Quaternion 4 x f32 (x, y, z, w)
//! Color      4 x f32 (r, g, b, a)
//! String     u16 length + UTF-8 bytes
//! ```

use crate::error::{Error, Result};

/// Value kind of a parameter (one-byte wire tag).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Bool = 2,
    Int = 3,
    Float = 4,
    Vector2 = 5,
    Vector3 = 6,
    Vector4 = 7,
    Quaternion = 8,
    Color = 9,
    String = 10,
}

impl ParameterKind {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            2 => Some(ParameterKind::Bool),
            3 => Some(ParameterKind::Int),
            4 => Some(ParameterKind::Float),
            5 => Some(ParameterKind::Vector2),
            6 => Some(ParameterKind::Vector3),
            7 => Some(ParameterKind::Vector4),
            8 => Some(ParameterKind::Quaternion),
            9 => Some(ParameterKind::Color),
            10 => Some(ParameterKind::String),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Payload size for fixed-size kinds, `None` for strings.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            ParameterKind::Bool => Some(1),
            ParameterKind::Int | ParameterKind::Float => Some(4),
            ParameterKind::Vector2 => Some(8),
            ParameterKind::Vector3 => Some(12),
            ParameterKind::Vector4 | ParameterKind::Quaternion | ParameterKind::Color => {
                Some(16)
            }
            ParameterKind::String => None,
        }
    }

    /// Length of the payload of this kind at the start of `bytes`.
    pub fn payload_len(self, bytes: &[u8]) -> Result<usize> {
        let len = match self.fixed_size() {
            Some(size) => size,
            None => {
                let prefix = bytes
                    .get(..2)
                    .ok_or_else(|| Error::Decode("truncated string length".to_string()))?;
                2 + usize::from(u16::from_le_bytes([prefix[0], prefix[1]]))
            }
        };
        if bytes.len() < len {
            return Err(Error::Decode(format!(
                "{} payload needs {} bytes, got {}",
                self,
                len,
                bytes.len()
            )));
        }
        Ok(len)
    }
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParameterKind::Bool => "bool",
            ParameterKind::Int => "int",
            ParameterKind::Float => "float",
            ParameterKind::Vector2 => "vector2",
            ParameterKind::Vector3 => "vector3",
            ParameterKind::Vector4 => "vector4",
            ParameterKind::Quaternion => "quaternion",
            ParameterKind::Color => "color",
            ParameterKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A type that can be held by a `Parameter`.
pub trait ParameterValue: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Wire kind of this type.
    const KIND: ParameterKind;

    /// Append the wire encoding of `self` to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decode a value from exactly one payload.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

fn expect_len(kind: ParameterKind, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(Error::Decode(format!(
            "{} payload must be {} bytes, got {}",
            kind,
            expected,
            bytes.len()
        )));
    }
    Ok(())
}

fn read_f32s<const N: usize>(kind: ParameterKind, bytes: &[u8]) -> Result<[f32; N]> {
    expect_len(kind, bytes, N * 4)?;
    let mut out = [0f32; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(out)
}

impl ParameterValue for bool {
    const KIND: ParameterKind = ParameterKind::Bool;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        expect_len(Self::KIND, bytes, 1)?;
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Decode(format!("invalid bool byte {:#04x}", other))),
        }
    }
}

impl ParameterValue for i32 {
    const KIND: ParameterKind = ParameterKind::Int;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        expect_len(Self::KIND, bytes, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl ParameterValue for f32 {
    const KIND: ParameterKind = ParameterKind::Float;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let [value] = read_f32s::<1>(Self::KIND, bytes)?;
        Ok(value)
    }
}

impl ParameterValue for String {
    const KIND: ParameterKind = ParameterKind::String;

    fn encode(&self, buf: &mut Vec<u8>) {
        // Longer strings are truncated at a char boundary to fit the u16 prefix.
        let mut end = self.len().min(usize::from(u16::MAX));
        while !self.is_char_boundary(end) {
            end -= 1;
        }
        buf.extend_from_slice(&(end as u16).to_le_bytes());
        buf.extend_from_slice(&self.as_bytes()[..end]);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let len = Self::KIND.payload_len(bytes)?;
        expect_len(Self::KIND, bytes, len)?;
        String::from_utf8(bytes[2..].to_vec())
            .map_err(|e| Error::Decode(format!("string payload is not UTF-8: {}", e)))
    }
}

macro_rules! float_vector {
    ($(#[$meta:meta])* $name:ident, $kind:ident, [$($field:ident),+], $n:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl $name {
            pub const fn new($($field: f32),+) -> Self {
                Self { $($field),+ }
            }
        }

        impl ParameterValue for $name {
            const KIND: ParameterKind = ParameterKind::$kind;

            fn encode(&self, buf: &mut Vec<u8>) {
                $(buf.extend_from_slice(&self.$field.to_le_bytes());)+
            }

            fn decode(bytes: &[u8]) -> Result<Self> {
                let [$($field),+] = read_f32s::<$n>(Self::KIND, bytes)?;
                Ok(Self { $($field),+ })
            }
        }
    };
}

float_vector!(
    /// Two-component vector.
    Vector2, Vector2, [x, y], 2
);
float_vector!(
    /// Three-component vector (positions, scales).
    Vector3, Vector3, [x, y, z], 3
);
float_vector!(
    /// Four-component vector.
    Vector4, Vector4, [x, y, z, w], 4
);
float_vector!(
    /// Rotation quaternion.
    Quaternion, Quaternion, [x, y, z, w], 4
);
float_vector!(
    /// Linear RGBA color.
    Color, Color, [r, g, b, a], 4
);

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);
}
