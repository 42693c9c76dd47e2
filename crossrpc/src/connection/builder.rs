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

//! Connection construction.

use super::pending::PendingCalls;
use super::{Connection, ConnectionId, ConnectionState, Role, Shared, tasks};
use crate::auth::TokenCodec;
use crate::dispatch::{ControllerRegistry, Dispatcher};
use crate::endpoint::ConnectionConfig;
use crate::metrics::ConnectionMetrics;
use crate::registry::ConnectionRegistry;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

#[cfg(feature = "observability")]
use tracing::info;

/// Everything an endpoint shares between the connections it creates.
#[derive(Clone)]
pub(crate) struct Environment {
    pub(crate) config: Arc<ConnectionConfig>,
    pub(crate) controllers: Arc<ControllerRegistry>,
    pub(crate) token_codec: Option<Arc<dyn TokenCodec>>,
    pub(crate) sessions: Option<Arc<ConnectionRegistry>>,
}

impl Environment {
    pub(crate) fn new(config: ConnectionConfig) -> Self {
        Self {
            config: Arc::new(config),
            controllers: Arc::new(ControllerRegistry::empty()),
            token_codec: None,
            sessions: None,
        }
    }

    /// Starts a connection over `transport`. Must run inside a Tokio runtime.
    pub(crate) fn start(&self, transport: Box<dyn Transport>, role: Role) -> Connection {
        let metadata = transport.metadata().clone();
        let (sink, source) = transport.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let config = &self.config;

        let shared = Arc::new(Shared {
            id: ConnectionId::next(),
            role,
            metadata,
            environment: self.clone(),
            dispatcher: Dispatcher::new(self.controllers.clone(), config.default_controller.clone()),
            pending: PendingCalls::new(config.max_pending_calls),
            outbound,
            state,
            torn_down: AtomicBool::new(false),
            cause: OnceLock::new(),
            principal: Mutex::new(None),
            close_callbacks: Mutex::new(Some(Vec::new())),
            metrics: ConnectionMetrics::new(),
            runtime: Handle::current(),
        });

        // Open before the loops run so a failing transport can only move forward.
        shared.state.send_replace(ConnectionState::Open);

        #[cfg(feature = "observability")]
        info!(
            connection_id = %shared.id,
            %role,
            transport = shared.metadata.transport_type,
            peer = ?shared.metadata.peer_addr,
            "connection opened"
        );

        tokio::spawn(tasks::send_loop(shared.clone(), sink, outbound_rx));
        tokio::spawn(tasks::receive_loop(shared.clone(), source));

        Connection { shared }
    }
}

/// Builds standalone connections.
///
/// Endpoints ([`Server`](crate::endpoint::Server) and
/// [`Client`](crate::endpoint::Client)) use the same machinery; the builder
/// is for callers that manage transports themselves.
///
/// # Examples
///
/// ```rust
/// use crossrpc::connection::{ConnectionBuilder, Role};
/// use crossrpc::endpoint::ConnectionConfig;
/// use crossrpc::transport::MemoryTransport;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (left, _right) = MemoryTransport::pair(16);
/// let connection = ConnectionBuilder::new()
///     .config(ConnectionConfig::default().with_default_controller("Lobby"))
///     .connect(Box::new(left));
/// assert_eq!(connection.role(), Role::Client);
/// assert_eq!(connection.config().default_controller, "Lobby");
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionBuilder {
    environment: Environment,
}

impl ConnectionBuilder {
    /// Creates a builder with the default configuration and no controllers.
    pub fn new() -> Self {
        Self {
            environment: Environment::new(ConnectionConfig::default()),
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.environment.config = Arc::new(config);
        self
    }

    /// Sets the controllers this side serves.
    pub fn controllers(mut self, controllers: impl Into<Arc<ControllerRegistry>>) -> Self {
        self.environment.controllers = controllers.into();
        self
    }

    /// Sets the codec used to issue and verify tokens.
    pub fn token_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.environment.token_codec = Some(codec);
        self
    }

    /// Makes authorized connections join `sessions`.
    pub fn sessions(mut self, sessions: Arc<ConnectionRegistry>) -> Self {
        self.environment.sessions = Some(sessions);
        self
    }

    /// Starts a connection over an accepted transport.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn accept(&self, transport: Box<dyn Transport>) -> Connection {
        self.environment.start(transport, Role::Server)
    }

    /// Starts a connection over a dialed transport.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn connect(&self, transport: Box<dyn Transport>) -> Connection {
        self.environment.start(transport, Role::Client)
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
