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

//! In-memory transport.
//!
//! [`MemoryTransport::pair`] returns two connected transports backed by bounded
//! `tokio::sync::mpsc` channels. Fragment boundaries are preserved exactly,
//! which makes the memory transport the reference transport for tests.
//!
//! [`memory_endpoint`] adds a listener/connector pair on top, so servers and
//! lazily connecting clients can be exercised without sockets.
//!
//! # Examples
//!
//! ```rust
//! use crossrpc::transport::{MemoryTransport, Transport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (left, right) = MemoryTransport::pair(16);
//! let (mut left_sink, _left_source) = Box::new(left).split();
//! let (_right_sink, mut right_source) = Box::new(right).split();
//!
//! left_sink.send(b"hello", true).await?;
//! let fragment = right_source.receive().await?;
//! assert_eq!(fragment.data, b"hello");
//! assert!(fragment.end_of_message);
//! # Ok(())
//! # }
//! ```

use super::{
    CloseReason, Connector, Fragment, Transport, TransportError, TransportListener,
    TransportMetadata, TransportSink, TransportSource,
};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::sync::{Mutex, mpsc};

#[cfg(feature = "observability")]
use tracing::debug;

/// One end of an in-memory duplex pipe.
pub struct MemoryTransport {
    metadata: TransportMetadata,
    tx: mpsc::Sender<Fragment>,
    rx: mpsc::Receiver<Fragment>,
}

impl MemoryTransport {
    /// Creates a pair of connected transports.
    ///
    /// `buffer_size` bounds the number of in-flight fragments per direction;
    /// a full buffer applies backpressure to the sender.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(buffer_size);
        let (tx2, rx2) = mpsc::channel(buffer_size);

        let first = Self {
            metadata: TransportMetadata::new("memory"),
            tx: tx1,
            rx: rx2,
        };
        let second = Self {
            metadata: TransportMetadata::new("memory"),
            tx: tx2,
            rx: rx1,
        };

        #[cfg(feature = "observability")]
        debug!(
            first = %first.metadata.id,
            second = %second.metadata.id,
            buffer_size,
            "created memory transport pair"
        );

        (first, second)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportSource>) {
        let this = *self;
        (
            Box::new(MemorySink { tx: Some(this.tx) }),
            Box::new(MemorySource { rx: this.rx }),
        )
    }
}

struct MemorySink {
    tx: Option<mpsc::Sender<Fragment>>,
}

#[async_trait]
impl TransportSink for MemorySink {
    async fn send(&mut self, fragment: &[u8], end_of_message: bool) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(Fragment::new(fragment.to_vec(), end_of_message))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, _reason: CloseReason) -> Result<(), TransportError> {
        // Dropping the sender is the close handshake: the peer sees end of stream.
        self.tx = None;
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::Receiver<Fragment>,
}

#[async_trait]
impl TransportSource for MemorySource {
    async fn receive(&mut self) -> Result<Fragment, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

/// Creates a connected listener/connector pair.
///
/// Every [`Connector::connect`] call creates a fresh [`MemoryTransport`] pair
/// and hands the far end to the listener.
pub fn memory_endpoint(buffer_size: usize) -> (MemoryConnector, MemoryListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryConnector { tx, buffer_size },
        MemoryListener { rx: Mutex::new(rx) },
    )
}

/// Client side of [`memory_endpoint`].
#[derive(Clone)]
pub struct MemoryConnector {
    tx: mpsc::UnboundedSender<MemoryTransport>,
    buffer_size: usize,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (local, remote) = MemoryTransport::pair(self.buffer_size);
        self.tx
            .send(remote)
            .map_err(|_| TransportError::ConnectionFailed {
                address: "memory".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "memory listener dropped",
                ),
            })?;
        Ok(Box::new(local))
    }
}

/// Server side of [`memory_endpoint`].
pub struct MemoryListener {
    rx: Mutex<mpsc::UnboundedReceiver<MemoryTransport>>,
}

#[async_trait]
impl TransportListener for MemoryListener {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let transport = self.rx.lock().await.recv().await.ok_or(TransportError::Closed)?;
        Ok(Box::new(transport))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Err(TransportError::InvalidConfiguration {
            reason: "memory listeners have no socket address".to_string(),
        })
    }
}
