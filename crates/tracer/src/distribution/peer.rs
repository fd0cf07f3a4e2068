// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One connected requester as seen by the server thread.

use super::frame::FrameCodec;
use mio::net::TcpStream;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr};
use std::time::{Duration, Instant};

/// Outcome of polling a peer for a request.
#[derive(Debug)]
pub(crate) enum PeerPoll {
    /// A complete request frame.
    Request(Vec<u8>),
    /// Nothing (or only part of a frame) available yet, or a response is
    /// still being written.
    Idle,
    /// The peer closed its side at a frame boundary.
    Closed,
    /// Protocol or I/O failure; the peer must be dropped.
    Failed(io::Error),
}

/// Progress of the pending response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flush {
    /// Nothing left to write.
    Done,
    /// The socket is full; resume on the next writable event.
    Pending,
}

pub(crate) struct Peer {
    stream: TcpStream,
    codec: FrameCodec,
    addr: SocketAddr,
    write_timeout: Duration,
    /// Framed response being written
    send_queue: Vec<u8>,
    send_offset: usize,
    /// Time by which the pending response must be fully written
    deadline: Option<Instant>,
}

impl Peer {
    pub(crate) fn new(
        stream: TcpStream,
        addr: SocketAddr,
        max_request_size: usize,
        write_timeout: Duration,
    ) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            codec: FrameCodec::new(max_request_size),
            addr,
            write_timeout,
            send_queue: Vec::new(),
            send_offset: 0,
            deadline: None,
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// True while a response is still being written.
    pub(crate) fn is_sending(&self) -> bool {
        self.send_offset < self.send_queue.len()
    }

    /// True once the pending response has missed its deadline.
    pub(crate) fn is_overdue(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Try to read one request without blocking.
    ///
    /// No request is read while a response is pending.
    pub(crate) fn poll_request(&mut self) -> PeerPoll {
        if self.is_sending() {
            return PeerPoll::Idle;
        }
        match self.codec.decode(&mut self.stream) {
            Ok(Some(frame)) => PeerPoll::Request(frame),
            Ok(None) => PeerPoll::Idle,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !self.codec.is_partial() => {
                PeerPoll::Closed
            }
            Err(e) => PeerPoll::Failed(e),
        }
    }

    /// Queue one response frame and write as much of it as the socket takes.
    ///
    /// The whole frame must be written within the write timeout.
    pub(crate) fn respond(&mut self, payload: &[u8]) -> io::Result<Flush> {
        if u32::try_from(payload.len()).is_err() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame payload exceeds u32",
            ));
        }
        self.send_queue = FrameCodec::encode(payload);
        self.send_offset = 0;
        self.deadline = Some(Instant::now() + self.write_timeout);
        self.flush()
    }

    /// Continue writing the pending response.
    pub(crate) fn flush(&mut self) -> io::Result<Flush> {
        while self.send_offset < self.send_queue.len() {
            match self.stream.write(&self.send_queue[self.send_offset..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer stopped accepting data",
                    ))
                }
                Ok(n) => self.send_offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Flush::Pending),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.send_queue = Vec::new();
        self.send_offset = 0;
        self.deadline = None;
        Ok(Flush::Done)
    }

    /// Shut down both directions. An already disconnected peer is not an error.
    pub(crate) fn close(self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("addr", &self.addr)
            .field("partial", &self.codec.is_partial())
            .field("sending", &self.is_sending())
            .finish()
    }
}
