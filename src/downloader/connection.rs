//! TCP connection setup and the request write

use super::config::SessionConfig;
use super::DownloadError;
use crate::request::DataRequest;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

/// An open connection to a data server.
///
/// Dropping the connection closes the socket immediately; with zero linger any unsent data
/// is discarded.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::ResolutionError`] if the name does not resolve
    /// - [`DownloadError::ConnectionError`] if every address refuses or times out
    pub async fn open(host: &str, port: u16, config: &SessionConfig) -> Result<Self, DownloadError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|e| DownloadError::ResolutionError {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(DownloadError::ResolutionError {
                host: host.to_string(),
                port,
                reason: "no addresses returned".to_string(),
            });
        }

        let mut last_error = None;
        for addr in addrs {
            match connect_one(addr, config).await {
                Ok(stream) => {
                    info!(%addr, "Connected to data server");
                    return Ok(Self { stream, peer: addr });
                }
                Err(reason) => {
                    debug!(%addr, %reason, "Connect attempt failed");
                    last_error = Some(DownloadError::ConnectionError {
                        target: addr.to_string(),
                        reason,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::ConnectionError {
            target: format!("{host}:{port}"),
            reason: "no address attempted".to_string(),
        }))
    }

    /// Write the request line and its NUL terminator, then flush.
    pub async fn send_request(&mut self, request: &DataRequest) -> Result<(), DownloadError> {
        let line = request.wire_line();
        let send_error = |e: std::io::Error| DownloadError::ConnectionError {
            target: self.peer.to_string(),
            reason: format!("sending request: {e}"),
        };

        self.stream.write_all(&line).await.map_err(send_error)?;
        self.stream.flush().await.map_err(send_error)?;

        debug!(request = %request, bytes = line.len(), "Request sent");
        Ok(())
    }

    /// Address of the connected server
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Hand the socket over to the record reader.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

async fn connect_one(addr: SocketAddr, config: &SessionConfig) -> Result<TcpStream, String> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| e.to_string())?;

    // The kernel may round this up; it only needs to be small.
    socket
        .set_recv_buffer_size(config.recv_buffer_bytes)
        .map_err(|e| e.to_string())?;
    socket
        .set_linger(Some(Duration::ZERO))
        .map_err(|e| e.to_string())?;

    match timeout(config.connect_timeout, socket.connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", config.connect_timeout)),
    }
}
