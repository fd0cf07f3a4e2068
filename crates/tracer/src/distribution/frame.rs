// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for the scene request/response channel.
//!
//! TCP has no message boundaries, so every request and response is framed:
//!
//! ```text
//! +----------------+-------------------------+
//! | Length (4B BE) | Payload                 |
//! +----------------+-------------------------+
//! ```
//!
//! A request payload is the UTF-8 segment name, a response payload the raw
//! segment bytes. A zero length is a valid frame (the empty response to an
//! unknown request).

use std::io::{self, Read, Write};

/// Frame header size (4 bytes for length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Incremental frame decoder.
///
/// Keeps partial-read state between calls so it can be driven by a
/// non-blocking socket: a `WouldBlock` mid-frame resumes where it stopped.
#[derive(Debug)]
pub struct FrameCodec {
    state: ReadState,
    buffer: Vec<u8>,
    /// Maximum allowed payload size (anti-OOM protection)
    max_size: usize,
    frames_decoded: u64,
}

#[derive(Debug, Clone, Copy)]
enum ReadState {
    ReadingLength {
        bytes_read: usize,
    },
    ReadingBody {
        expected_len: usize,
        bytes_read: usize,
    },
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::ReadingLength { bytes_read: 0 }
    }
}

impl FrameCodec {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReadState::default(),
            buffer: vec![0u8; FRAME_HEADER_SIZE],
            max_size,
            frames_decoded: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Encode a payload into a framed buffer: `[length: u32 BE][payload]`.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Write one frame, header and payload, to a blocking writer.
    pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "frame payload exceeds u32")
        })?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(payload)?;
        writer.flush()
    }

    /// Try to decode a complete frame from the reader.
    ///
    /// Returns:
    /// - `Ok(Some(data))` - a complete frame was decoded
    /// - `Ok(None)` - need more data (WouldBlock)
    /// - `Err(e)` - I/O error, EOF or oversized frame
    pub fn decode<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        loop {
            match self.state {
                ReadState::ReadingLength { bytes_read } => {
                    match reader.read(&mut self.buffer[bytes_read..FRAME_HEADER_SIZE]) {
                        Ok(0) => {
                            let msg = if bytes_read == 0 {
                                "connection closed"
                            } else {
                                "incomplete frame header"
                            };
                            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg));
                        }
                        Ok(n) => {
                            let total = bytes_read + n;
                            if total < FRAME_HEADER_SIZE {
                                self.state = ReadState::ReadingLength { bytes_read: total };
                                continue;
                            }

                            let len = u32::from_be_bytes([
                                self.buffer[0],
                                self.buffer[1],
                                self.buffer[2],
                                self.buffer[3],
                            ]) as usize;

                            if len > self.max_size {
                                self.state = ReadState::default();
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!("frame too large: {} bytes (max {})", len, self.max_size),
                                ));
                            }

                            if len == 0 {
                                self.frames_decoded += 1;
                                self.state = ReadState::default();
                                return Ok(Some(Vec::new()));
                            }

                            self.buffer.resize(len, 0);
                            self.state = ReadState::ReadingBody {
                                expected_len: len,
                                bytes_read: 0,
                            };
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return Ok(None);
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }

                ReadState::ReadingBody {
                    expected_len,
                    bytes_read,
                } => match reader.read(&mut self.buffer[bytes_read..expected_len]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "incomplete frame body",
                        ));
                    }
                    Ok(n) => {
                        let total = bytes_read + n;
                        if total < expected_len {
                            self.state = ReadState::ReadingBody {
                                expected_len,
                                bytes_read: total,
                            };
                            continue;
                        }

                        let frame = self.buffer[..expected_len].to_vec();
                        self.frames_decoded += 1;
                        self.buffer.resize(FRAME_HEADER_SIZE, 0);
                        self.state = ReadState::default();
                        return Ok(Some(frame));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return Ok(None);
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                },
            }
        }
    }

    /// True while a frame has been partially read.
    pub fn is_partial(&self) -> bool {
        match self.state {
            ReadState::ReadingLength { bytes_read } => bytes_read > 0,
            ReadState::ReadingBody { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Reader that hands out scripted chunks, then WouldBlock.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Err(io::ErrorKind::WouldBlock.into());
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.chunks.push_front(chunk);
            }
            Ok(n)
        }
    }

    #[test]
    fn test_encode_layout() {
        let frame = FrameCodec::encode(b"nodes");
        assert_eq!(&frame[..4], &5u32.to_be_bytes());
        assert_eq!(&frame[4..], b"nodes");
    }

    #[test]
    fn test_decode_across_partial_reads() {
        let frame = FrameCodec::encode(b"header");
        let mut reader = ChunkedReader::new(vec![frame[..2].to_vec()]);
        let mut codec = FrameCodec::new(64);

        assert!(codec.decode(&mut reader).unwrap().is_none());
        assert!(codec.is_partial());

        reader.chunks.push_back(frame[2..7].to_vec());
        assert!(codec.decode(&mut reader).unwrap().is_none());

        reader.chunks.push_back(frame[7..].to_vec());
        assert_eq!(codec.decode(&mut reader).unwrap().unwrap(), b"header");
        assert!(!codec.is_partial());
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn test_decode_empty_frame() {
        let mut reader = ChunkedReader::new(vec![FrameCodec::encode(&[])]);
        let mut codec = FrameCodec::new(64);
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut reader = ChunkedReader::new(vec![FrameCodec::encode(&[0u8; 100])]);
        let mut codec = FrameCodec::new(16);
        let err = codec.decode(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_eof_reported() {
        let mut codec = FrameCodec::new(16);
        let err = codec.decode(&mut io::empty()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_frame() {
        let mut out = Vec::new();
        FrameCodec::write_frame(&mut out, &[1, 2, 3]).unwrap();
        assert_eq!(out, FrameCodec::encode(&[1, 2, 3]));
    }
}
