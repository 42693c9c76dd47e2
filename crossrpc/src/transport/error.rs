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

//! Transport error types.

use std::io;
use thiserror::Error;

/// Errors raised by transports.
///
/// Every transport error observed by a connection loop is fatal to that
/// connection; the classification helpers only decide how the failure is
/// reported.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// Address that was dialled.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The connection dropped unexpectedly.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Human readable reason.
        reason: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// The peer closed the transport cleanly.
    #[error("transport is closed")]
    Closed,

    /// Failed to bind a listener.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A transport-level frame exceeded the configured limit.
    #[error("transport frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Frame size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The transport was configured with unusable parameters.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong.
        reason: String,
    },

    /// Generic I/O failure.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// WebSocket protocol failure.
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The peer sent a WebSocket message this protocol does not use.
    #[cfg(feature = "websocket")]
    #[error("WebSocket protocol violation: {reason}")]
    WebSocketProtocol {
        /// What was received.
        reason: String,
    },
}

impl TransportError {
    /// Returns true if the error means the peer went away, cleanly or not,
    /// rather than that something is broken locally.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Closed | TransportError::ConnectionLost { .. } => true,
            TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            #[cfg(feature = "websocket")]
            TransportError::WebSocket(e) => {
                use tokio_tungstenite::tungstenite::Error as WsError;
                matches!(e, WsError::ConnectionClosed | WsError::AlreadyClosed)
            }
            _ => false,
        }
    }

    /// Returns true if retrying the same operation later could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } | TransportError::ConnectionLost { .. } => true,
            TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
