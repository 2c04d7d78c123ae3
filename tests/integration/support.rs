//! Mock DATREQ servers shared by the integration tests

use std::io::{Read, Write};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use waveform_downloader::{FRAME_LEN, TERMINATOR_RANGE};

/// Deterministic data record `index`: sequence number up front, never the terminator tag.
pub fn data_frame(index: usize) -> Vec<u8> {
    let mut bytes = vec![(index % 251) as u8; FRAME_LEN];
    let header = format!("{:06}D ", index + 1);
    bytes[..8].copy_from_slice(header.as_bytes());
    bytes[TERMINATOR_RANGE].copy_from_slice(b"BHZ00");
    bytes
}

/// Terminator record: `RQLOG` at bytes 13..18.
pub fn terminator_frame() -> Vec<u8> {
    let mut bytes = vec![b' '; FRAME_LEN];
    bytes[..8].copy_from_slice(b"000000  ");
    bytes[TERMINATOR_RANGE].copy_from_slice(b"RQLOG");
    bytes
}

/// The bytes a server following `behavior` sends.
pub fn response_bytes(behavior: &MockBehavior) -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..behavior.frames).flat_map(data_frame).collect();
    if behavior.terminator {
        bytes.extend(terminator_frame());
    }
    bytes.extend(vec![0xAB; behavior.trailing_bytes]);
    bytes
}

/// What the mock server sends after reading the request.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Data records to send
    pub frames: usize,
    /// Whether to finish with the terminator record
    pub terminator: bool,
    /// Incomplete record bytes sent after the records
    pub trailing_bytes: usize,
    /// Write size; each write is flushed separately
    pub chunk: usize,
    /// Keep the connection open after sending until the client closes it
    pub hold_open: bool,
}

impl MockBehavior {
    /// `frames` records followed by the terminator, in whole-record writes
    pub fn complete(frames: usize) -> Self {
        Self {
            frames,
            terminator: true,
            trailing_bytes: 0,
            chunk: FRAME_LEN,
            hold_open: false,
        }
    }

    /// `frames` records then close, no terminator
    pub fn closes_after(frames: usize) -> Self {
        Self {
            terminator: false,
            ..Self::complete(frames)
        }
    }

    /// `frames` records, then wait for the client to hang up
    pub fn stalls_after(frames: usize) -> Self {
        Self {
            terminator: false,
            hold_open: true,
            ..Self::complete(frames)
        }
    }

    /// Send in writes of `chunk` bytes
    pub fn in_chunks(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }
}

/// What the mock server observed.
#[derive(Debug)]
pub struct MockReport {
    /// Request bytes up to and including the NUL
    pub request: Vec<u8>,
    /// Whether the client hung up while the server held the connection open
    pub client_closed: bool,
}

/// Async mock server accepting a single connection.
pub struct MockServer {
    /// Port bound on 127.0.0.1
    pub port: u16,
    handle: JoinHandle<MockReport>,
}

impl MockServer {
    /// Bind and serve one connection according to `behavior`.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while socket.read_exact(&mut byte).await.is_ok() {
                request.push(byte[0]);
                if byte[0] == 0 {
                    break;
                }
            }

            // Write errors are expected once the client has hung up.
            let response = response_bytes(&behavior);
            for chunk in response.chunks(behavior.chunk) {
                if socket.write_all(chunk).await.is_err() || socket.flush().await.is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }

            let mut client_closed = false;
            if behavior.hold_open {
                let mut sink = [0u8; 64];
                let waited =
                    tokio::time::timeout(Duration::from_secs(10), socket.read(&mut sink)).await;
                client_closed = matches!(waited, Ok(Ok(0)) | Ok(Err(_)));
            }

            MockReport {
                request,
                client_closed,
            }
        });

        Self { port, handle }
    }

    /// Wait for the server task and return what it saw.
    pub async fn finish(self) -> MockReport {
        tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("mock server did not finish")
            .expect("mock server panicked")
    }
}

/// Blocking mock server on its own thread, for tests that drive the binary.
pub fn start_blocking_server(behavior: MockBehavior) -> (u16, std::thread::JoinHandle<Vec<u8>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();

        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while socket.read_exact(&mut byte).is_ok() {
            request.push(byte[0]);
            if byte[0] == 0 {
                break;
            }
        }

        for chunk in response_bytes(&behavior).chunks(behavior.chunk) {
            if socket.write_all(chunk).is_err() {
                break;
            }
        }
        let _ = socket.flush();
        request
    });

    (port, handle)
}

/// A port on 127.0.0.1 that nothing listens on.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
