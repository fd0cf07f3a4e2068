// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Requester side of the scene distribution channel.

use super::frame::FrameCodec;
use crate::config::MAX_RESPONSE_SIZE;
use crate::error::{Error, Result};
use crate::snapshot::{SceneSegments, SegmentKind};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Blocking client pulling snapshot segments from a [`DistributionServer`].
///
/// Requests are strictly sequential: each `request` waits for its response.
/// After a failed request (timeout, I/O or framing error) the connection is
/// shut down, since a late response would answer the next request; every
/// further call fails until the client reconnects.
///
/// [`DistributionServer`]: super::DistributionServer
#[derive(Debug)]
pub struct SceneClient {
    stream: TcpStream,
    codec: FrameCodec,
    server: SocketAddr,
    failed: bool,
}

impl SceneClient {
    /// Connect to a server; `timeout` bounds the connect and every response.
    pub fn connect(server: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&server, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        log::debug!("[SceneClient] connected to {}", server);
        Ok(Self {
            stream,
            codec: FrameCodec::new(MAX_RESPONSE_SIZE),
            server,
            failed: false,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// False once a request has failed and the connection was shut down.
    pub fn is_usable(&self) -> bool {
        !self.failed
    }

    /// Open a fresh connection to the same server.
    pub fn reconnect(&mut self, timeout: Duration) -> Result<()> {
        *self = Self::connect(self.server, timeout)?;
        Ok(())
    }

    /// Request one segment. An unknown name yields an empty buffer.
    pub fn request(&mut self, name: &str) -> Result<Vec<u8>> {
        if self.failed {
            return Err(Error::Protocol(format!(
                "connection to {} failed earlier, reconnect first",
                self.server
            )));
        }
        match self.exchange(name) {
            Ok(response) => Ok(response),
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    fn exchange(&mut self, name: &str) -> Result<Vec<u8>> {
        FrameCodec::write_frame(&mut self.stream, name.as_bytes())?;
        match self.codec.decode(&mut self.stream)? {
            Some(response) => Ok(response),
            None => Err(Error::Protocol(format!(
                "no response for '{}' from {} before timeout",
                name, self.server
            ))),
        }
    }

    fn fail(&mut self) {
        self.failed = true;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("[SceneClient] shutdown after failure: {}", e);
        }
        log::debug!("[SceneClient] connection to {} marked failed", self.server);
    }

    /// Request the six scene segments in order.
    ///
    /// Segments the server does not have (empty responses) are left out.
    pub fn fetch_scene(&mut self) -> Result<SceneSegments> {
        let mut segments = SceneSegments::new();
        for kind in SegmentKind::ALL {
            let bytes = self.request(kind.name())?;
            if !bytes.is_empty() {
                segments.insert(kind.name(), bytes);
            }
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_timeout_poisons_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let responder = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut codec = FrameCodec::new(64);
            let request = codec.decode(&mut stream).unwrap().unwrap();
            assert_eq!(request, b"header");

            // Half a response, the rest only after the client gave up.
            stream.write_all(&4u32.to_be_bytes()).unwrap();
            stream.write_all(&[0xAA, 0xAA]).unwrap();
            thread::sleep(Duration::from_millis(400));
            let _ = stream.write_all(&[0xAA, 0xAA]);
            let _ = FrameCodec::write_frame(&mut stream, &[1, 2, 3]);
        });

        let mut client = SceneClient::connect(addr, Duration::from_millis(150)).unwrap();
        assert!(matches!(client.request("header"), Err(Error::Protocol(_))));
        assert!(!client.is_usable());

        thread::sleep(Duration::from_millis(500));
        assert!(matches!(client.request("nodes"), Err(Error::Protocol(_))));
        responder.join().unwrap();
    }

    #[test]
    fn test_reconnect_after_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let responder = thread::spawn(move || {
            // First connection: closed without answering.
            let (first, _) = listener.accept().unwrap();
            drop(first);

            let (mut stream, _) = listener.accept().unwrap();
            let mut codec = FrameCodec::new(64);
            let request = codec.decode(&mut stream).unwrap().unwrap();
            assert_eq!(request, b"nodes");
            FrameCodec::write_frame(&mut stream, &[1, 2, 3]).unwrap();
        });

        let timeout = Duration::from_secs(5);
        let mut client = SceneClient::connect(addr, timeout).unwrap();
        assert!(client.request("header").is_err());
        assert!(!client.is_usable());

        client.reconnect(timeout).unwrap();
        assert!(client.is_usable());
        assert_eq!(client.request("nodes").unwrap(), vec![1u8, 2, 3]);
        responder.join().unwrap();
    }
}
