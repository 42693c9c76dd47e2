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

//! Transport layer.
//!
//! A transport moves opaque fragments between two peers, in order and without
//! loss. The connection engine never sees sockets: it receives a boxed
//! [`Transport`], splits it once, and from then on the send loop owns the
//! [`TransportSink`] and the receive loop owns the [`TransportSource`].
//!
//! Provided transports:
//!
//! - [`MemoryTransport`]: in-process pipe, used heavily in tests
//! - [`TcpTransport`]: TCP with a small length-prefixed framing layer
//! - [`WebSocketTransport`]: WebSocket binary messages (feature `websocket`)
//!
//! Servers accept through a [`TransportListener`]; lazily connecting clients
//! dial through a [`Connector`].

mod error;
mod memory;
mod tcp;
mod traits;
mod types;
#[cfg(feature = "websocket")]
mod websocket;

pub use self::error::TransportError;
pub use self::memory::{MemoryConnector, MemoryListener, MemoryTransport, memory_endpoint};
pub use self::tcp::{
    MAX_TCP_FRAME_SIZE, TcpConnector, TcpTransport, TcpTransportListener, read_frame, write_frame,
};
pub use self::traits::{
    CloseReason, Connector, Fragment, Transport, TransportListener, TransportSink, TransportSource,
};
pub use self::types::{TransportId, TransportMetadata};
#[cfg(feature = "websocket")]
pub use self::websocket::{
    WebSocketConfig, WebSocketConnector, WebSocketTransport, WebSocketTransportListener,
};
