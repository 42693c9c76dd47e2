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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! crossrpc is organized in layers, leaf to root:
//!
//! - **[`codec`]**: the seven byte frame header, request and response
//!   envelopes, result codes and value serializers
//! - **[`transport`]**: fragment-oriented duplex transports (memory, TCP,
//!   WebSocket)
//! - **[`connection`]**: the engine. Correlates calls, runs the send and
//!   receive loops, owns the lifecycle and authorization state
//! - **[`dispatch`]**: resolves inbound actions to controller methods
//! - **[`bridge`]**: turns typed proxy calls into requests and back
//! - **[`registry`]**: live connections by principal, for fan-out
//! - **[`endpoint`]**: the server accept loop and the lazy client
//!
//! The [`controller`] attribute generates both halves of a controller from
//! one trait: a dispatcher that serves it and a proxy that calls it.
//!
//! ## Error Handling
//!
//! - [`RpcError`]: the outcome of one call
//! - [`RemoteError`]: a result code and message from the peer
//! - [`ConnectionError`]: why a connection died
//! - [`TransportError`]: low-level I/O failures
//!
//! ## Features
//!
//! - **`derive`** (default): the `#[controller]` attribute
//! - **`json`** (default): JSON values through `serde_json`
//! - **`postcard`**: compact binary values through `postcard`
//! - **`websocket`** (default): WebSocket transport through `tokio-tungstenite`
//! - **`observability`** (default): `tracing` spans and events, `metrics` counters
//!
//! ## Safety
//!
//! crossrpc is written in 100% safe Rust with `#![deny(unsafe_code)]`.

#[cfg(not(any(feature = "json", feature = "postcard")))]
compile_error!("crossrpc needs at least one value format: enable `json` or `postcard`");

pub mod auth;
pub mod bridge;
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod transport;

#[cfg(feature = "derive")]
pub use crossrpc_macros::controller;

// Used by generated code.
#[doc(hidden)]
pub use async_trait::async_trait;

pub use auth::{AuthToken, PrincipalId, TokenClaims, TokenCodec};
pub use bridge::{Call, Invoker, invoke, invoke_blocking};
pub use codec::{ResultCode, ValueFormat};
pub use connection::{Connection, ConnectionBuilder, ConnectionId, ConnectionState};
pub use dispatch::{ControllerRegistry, RequestContext};
pub use endpoint::{Client, ConnectionConfig, Server};
pub use error::{ConnectionError, RemoteError, RpcError};
pub use registry::ConnectionRegistry;
pub use transport::{Transport, TransportError};
