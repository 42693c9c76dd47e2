//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! TCP transport.
//!
//! TCP is a byte stream, so fragment boundaries are restored with a small
//! length-prefixed framing layer:
//!
//! ```text
//! +----------------+-----------+-------------------+
//! | length: u32 BE | flags: u8 | payload (length)  |
//! +----------------+-----------+-------------------+
//! ```
//!
//! Bit 0 of `flags` is the end-of-message marker.

use super::{
    CloseReason, Connector, Fragment, Transport, TransportError, TransportListener,
    TransportMetadata, TransportSink, TransportSource,
};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

#[cfg(feature = "observability")]
use tracing::{debug, error, info};

/// Default upper bound for a single TCP frame.
pub const MAX_TCP_FRAME_SIZE: usize = 16 * 1024 * 1024;

const FRAME_PREFIX_SIZE: usize = 5;
const FLAG_END_OF_MESSAGE: u8 = 0b0000_0001;

/// A connected TCP stream.
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
    max_frame_size: usize,
}

impl TcpTransport {
    /// Wraps an already connected stream.
    ///
    /// # Errors
    ///
    /// Fails if the socket addresses cannot be read.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let metadata = TransportMetadata::new("tcp")
            .with_local_addr(local_addr)
            .with_peer_addr(peer_addr);

        #[cfg(feature = "observability")]
        debug!(transport_id = %metadata.id, %local_addr, %peer_addr, "created TCP transport");

        Ok(Self {
            stream,
            metadata,
            max_frame_size: MAX_TCP_FRAME_SIZE,
        })
    }

    /// Connects to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the connection is refused.
    pub async fn connect(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();

        #[cfg(feature = "observability")]
        info!(%address, "connecting to TCP endpoint");

        let stream = TcpStream::connect(&address).await.map_err(|e| {
            #[cfg(feature = "observability")]
            error!(%address, "failed to connect: {}", e);
            TransportError::ConnectionFailed {
                address: address.clone(),
                source: e,
            }
        })?;

        Ok(Self::from_stream(stream)?)
    }

    /// Overrides the largest accepted frame.
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportSource>) {
        let max_frame_size = self.max_frame_size;
        let (reader, writer) = self.stream.into_split();
        (
            Box::new(TcpSink {
                writer,
                max_frame_size,
            }),
            Box::new(TcpSource {
                reader,
                max_frame_size,
            }),
        )
    }
}

struct TcpSink {
    writer: OwnedWriteHalf,
    max_frame_size: usize,
}

#[async_trait]
impl TransportSink for TcpSink {
    async fn send(&mut self, fragment: &[u8], end_of_message: bool) -> Result<(), TransportError> {
        write_frame(&mut self.writer, fragment, end_of_message, self.max_frame_size).await
    }

    async fn close(&mut self, _reason: CloseReason) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    fn max_fragment_size(&self) -> Option<usize> {
        Some(self.max_frame_size)
    }
}

struct TcpSource {
    reader: OwnedReadHalf,
    max_frame_size: usize,
}

#[async_trait]
impl TransportSource for TcpSource {
    async fn receive(&mut self) -> Result<Fragment, TransportError> {
        read_frame(&mut self.reader, self.max_frame_size).await
    }
}

/// Writes one length-prefixed frame.
///
/// # Errors
///
/// Fails with [`TransportError::FrameTooLarge`] for oversized payloads and
/// with an I/O error if the write fails.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    end_of_message: bool,
    max_frame_size: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: max_frame_size,
        });
    }

    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    prefix[..4].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    prefix[4] = if end_of_message { FLAG_END_OF_MESSAGE } else { 0 };

    writer.write_all(&prefix).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
///
/// End of stream before a prefix is a clean close; end of stream inside a frame
/// is a lost connection.
///
/// # Errors
///
/// Fails with [`TransportError::Closed`] on clean end of stream and with
/// [`TransportError::FrameTooLarge`] when the prefix exceeds the limit.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Fragment, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(TransportError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| TransportError::ConnectionLost {
            reason: "stream ended inside a frame".to_string(),
            source: Some(e),
        })?;

    Ok(Fragment::new(data, prefix[4] & FLAG_END_OF_MESSAGE != 0))
}

/// Accepts TCP connections.
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Binds to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address is unavailable.
    pub async fn bind(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| TransportError::BindFailed {
                address: address.clone(),
                source: e,
            })?;

        #[cfg(feature = "observability")]
        info!(%address, "TCP listener bound");

        Ok(Self { listener })
    }
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _peer_addr) = self.listener.accept().await?;
        Ok(Box::new(TcpTransport::from_stream(stream)?))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Dials a fixed address for a lazily connecting client.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    /// Creates a connector for `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(TcpTransport::connect(self.address.clone()).await?))
    }
}
