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

//! Dialing side.

use crate::auth::TokenCodec;
use crate::bridge::Invoker;
use crate::codec::ValueFormat;
use crate::connection::{ConnectionState, Environment, Role};
use crate::dispatch::ControllerRegistry;
use crate::endpoint::ConnectionConfig;
use crate::transport::Connector;
use crate::{Connection, ConnectionError, RpcError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;

#[cfg(feature = "observability")]
use tracing::{info, warn};

struct ClientState {
    dial: tokio::sync::Mutex<()>,
    current: Mutex<Option<Connection>>,
    dialing: AtomicBool,
    runtime: Option<Handle>,
}

/// A lazily connecting endpoint.
///
/// No transport is opened until the first call. Once the connection closes,
/// the next call dials again; calls that were in flight fail with the close
/// cause and are not retried.
///
/// Clones share the same connection.
///
/// # Examples
///
/// ```rust
/// use crossrpc::connection::ConnectionState;
/// use crossrpc::dispatch::ControllerRegistry;
/// use crossrpc::endpoint::{Client, ConnectionConfig, Server};
/// use crossrpc::transport::memory_endpoint;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (connector, listener) = memory_endpoint(16);
/// let server = Server::new(ControllerRegistry::empty(), ConnectionConfig::default());
/// tokio::spawn(async move { server.serve(&listener).await });
///
/// let client = Client::new(connector, ConnectionConfig::default());
/// assert_eq!(client.state(), ConnectionState::Closed);
///
/// let connection = client.connection().await?;
/// assert_eq!(client.state(), ConnectionState::Open);
/// connection.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    connector: Arc<dyn Connector>,
    environment: Environment,
    state: Arc<ClientState>,
}

impl Client {
    /// Creates a client. Nothing is dialed yet.
    pub fn new(connector: impl Connector, config: ConnectionConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            environment: Environment::new(config),
            state: Arc::new(ClientState {
                dial: tokio::sync::Mutex::new(()),
                current: Mutex::new(None),
                dialing: AtomicBool::new(false),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Sets the controllers the server may call back into.
    pub fn with_controllers(mut self, controllers: impl Into<Arc<ControllerRegistry>>) -> Self {
        self.environment.controllers = controllers.into();
        self
    }

    /// Sets the codec used to issue and verify tokens on this side.
    pub fn with_token_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.environment.token_codec = Some(codec);
        self
    }

    /// Configuration applied to each connection.
    pub fn config(&self) -> &ConnectionConfig {
        &self.environment.config
    }

    /// Returns the open connection, dialing if there is none.
    ///
    /// Concurrent callers share a single dial.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::ConnectFailed`] if the connector fails.
    pub async fn connection(&self) -> Result<Connection, RpcError> {
        if let Some(connection) = self.current() {
            return Ok(connection);
        }

        let _dial = self.state.dial.lock().await;
        if let Some(connection) = self.current() {
            return Ok(connection);
        }

        let transport = {
            let _dialing = Dialing::start(&self.state.dialing);
            self.connector.connect().await
        };
        let transport = transport.map_err(|error| {
            #[cfg(feature = "observability")]
            warn!(%error, "connect failed");
            ConnectionError::ConnectFailed(Arc::new(error))
        })?;

        let connection = self.environment.start(transport, Role::Client);
        #[cfg(feature = "observability")]
        info!(connection_id = %connection.id(), "client connected");
        *self.state.current.lock() = Some(connection.clone());
        Ok(connection)
    }

    /// The current connection, if it is open.
    pub fn current(&self) -> Option<Connection> {
        self.state
            .current
            .lock()
            .as_ref()
            .filter(|connection| connection.is_open())
            .cloned()
    }

    /// State of the client as a whole.
    ///
    /// [`Connecting`](ConnectionState::Connecting) while dialing,
    /// [`Closed`](ConnectionState::Closed) before the first call.
    pub fn state(&self) -> ConnectionState {
        if self.state.dialing.load(Ordering::Acquire) {
            return ConnectionState::Connecting;
        }
        self.state
            .current
            .lock()
            .as_ref()
            .map_or(ConnectionState::Closed, Connection::state)
    }

    /// Closes the current connection. The next call dials again.
    pub async fn close(&self) {
        let connection = self.state.current.lock().take();
        if let Some(connection) = connection {
            connection.close().await;
        }
    }
}

#[async_trait]
impl Invoker for Client {
    async fn connection(&self) -> Result<Connection, RpcError> {
        Client::connection(self).await
    }

    fn format(&self) -> ValueFormat {
        self.environment.config.format
    }

    fn runtime(&self) -> Option<Handle> {
        self.state.runtime.clone()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.environment.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Marks the client as dialing for as long as it lives.
struct Dialing<'a>(&'a AtomicBool);

impl<'a> Dialing<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for Dialing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
