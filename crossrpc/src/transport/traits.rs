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

//! Transport traits.
//!
//! A transport is a reliable, ordered, message-capable duplex channel. The
//! connection engine splits it once into a [`TransportSink`], owned by the send
//! loop, and a [`TransportSource`], owned by the receive loop, so reading and
//! writing never contend for a lock.

use super::{TransportError, TransportMetadata};
use async_trait::async_trait;
use std::net::SocketAddr;

/// One unit received from or sent to a transport.
///
/// Large messages may span several fragments; only the last one carries
/// `end_of_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// True for the last fragment of a logical message.
    pub end_of_message: bool,
}

impl Fragment {
    /// Creates a fragment.
    pub fn new(data: Vec<u8>, end_of_message: bool) -> Self {
        Self {
            data,
            end_of_message,
        }
    }

    /// Creates a fragment that completes its message.
    pub fn last(data: Vec<u8>) -> Self {
        Self::new(data, true)
    }
}

/// Why a transport is being closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Orderly shutdown.
    Normal,
    /// The peer violated the wire protocol.
    ProtocolError(String),
    /// The local side failed.
    Error(String),
}

impl CloseReason {
    /// Returns a short description suitable for a close frame.
    pub fn description(&self) -> &str {
        match self {
            CloseReason::Normal => "normal closure",
            CloseReason::ProtocolError(reason) | CloseReason::Error(reason) => reason,
        }
    }
}

/// A duplex transport before it is handed to a connection.
pub trait Transport: Send + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;

    /// Splits the transport into independently owned halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportSource>);
}

/// Writing half of a transport.
#[async_trait]
pub trait TransportSink: Send + 'static {
    /// Writes one fragment.
    async fn send(&mut self, fragment: &[u8], end_of_message: bool) -> Result<(), TransportError>;

    /// Performs a best-effort close handshake.
    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError>;

    /// Largest fragment this transport accepts, if it has a limit of its own.
    fn max_fragment_size(&self) -> Option<usize> {
        None
    }
}

/// Reading half of a transport.
#[async_trait]
pub trait TransportSource: Send + 'static {
    /// Waits for the next fragment.
    ///
    /// A clean close by the peer is reported as [`TransportError::Closed`].
    async fn receive(&mut self) -> Result<Fragment, TransportError>;
}

/// Accepts inbound transports.
#[async_trait]
pub trait TransportListener: Send + Sync + 'static {
    /// Waits for the next inbound transport.
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Returns the bound address.
    #[allow(clippy::result_large_err)]
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// Establishes outbound transports for a lazily connecting client.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new transport to the remote endpoint.
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;
}
