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

//! Endpoints: the server accept loop and the lazily connecting client.
//!
//! Both create [`Connection`](crate::Connection)s with the same machinery and
//! differ only in how a transport is obtained:
//!
//! - [`Server`] accepts transports, from a
//!   [`TransportListener`](crate::transport::TransportListener) or one at a
//!   time, and tracks authorized connections per principal
//! - [`Client`] dials through a [`Connector`](crate::transport::Connector) on
//!   first use and again after the connection closed
//!
//! Every connection is configured by a [`ConnectionConfig`].

mod client;
mod config;
mod server;

pub use self::client::Client;
pub use self::config::{ConfigError, ConnectionConfig};
pub use self::server::Server;
