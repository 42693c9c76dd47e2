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

//! Accepting side.

use crate::auth::TokenCodec;
use crate::connection::{ConnectionId, Environment, Role};
use crate::dispatch::ControllerRegistry;
use crate::endpoint::ConnectionConfig;
use crate::registry::ConnectionRegistry;
use crate::transport::{Transport, TransportError, TransportListener};
use crate::Connection;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "observability")]
use tracing::{info, warn};

/// Pause after a failed accept, so a persistent failure such as running out
/// of file descriptors does not spin the accept loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Serves controllers to every connection it accepts.
///
/// Authorized connections are tracked per principal in
/// [`sessions`](Self::sessions), which is how server code reaches a user's
/// other connections.
///
/// # Examples
///
/// ```rust,no_run
/// use crossrpc::dispatch::ControllerRegistry;
/// use crossrpc::endpoint::{ConnectionConfig, Server};
/// use crossrpc::transport::TcpTransportListener;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let controllers = ControllerRegistry::builder().build()?;
/// let server = Server::new(controllers, ConnectionConfig::default());
/// let listener = TcpTransportListener::bind("127.0.0.1:9000").await?;
/// server.serve(&listener).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    environment: Environment,
    sessions: Arc<ConnectionRegistry>,
    live: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
}

impl Server {
    /// Creates a server.
    pub fn new(controllers: impl Into<Arc<ControllerRegistry>>, config: ConnectionConfig) -> Self {
        let sessions = Arc::new(ConnectionRegistry::new());
        let mut environment = Environment::new(config);
        environment.controllers = controllers.into();
        environment.sessions = Some(sessions.clone());
        Self {
            environment,
            sessions,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sets the codec used to issue and verify tokens.
    pub fn with_token_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.environment.token_codec = Some(codec);
        self
    }

    /// Shares a session registry, for example between a TCP and a WebSocket server.
    pub fn with_sessions(mut self, sessions: Arc<ConnectionRegistry>) -> Self {
        self.environment.sessions = Some(sessions.clone());
        self.sessions = sessions;
        self
    }

    /// Authorized connections by principal.
    pub fn sessions(&self) -> &Arc<ConnectionRegistry> {
        &self.sessions
    }

    /// Configuration applied to accepted connections.
    pub fn config(&self) -> &ConnectionConfig {
        &self.environment.config
    }

    /// Starts serving an accepted transport. Must be called inside a Tokio runtime.
    pub fn accept(&self, transport: Box<dyn Transport>) -> Connection {
        let connection = self.environment.start(transport, Role::Server);
        let id = connection.id();
        self.live.lock().insert(id, connection.clone());

        let live = Arc::downgrade(&self.live);
        connection.on_close(move |_| {
            if let Some(live) = live.upgrade() {
                live.lock().remove(&id);
            }
        });
        connection
    }

    /// Accepts connections until the listener closes.
    ///
    /// Failed accepts are logged and retried after a short pause. Returns once
    /// the listener reports [`TransportError::Closed`].
    ///
    /// # Errors
    ///
    /// None yet; every accept failure other than a close is retried.
    #[cfg_attr(feature = "observability", tracing::instrument(skip_all))]
    pub async fn serve<L>(&self, listener: &L) -> Result<(), TransportError>
    where
        L: TransportListener + ?Sized,
    {
        #[cfg(feature = "observability")]
        info!(addr = ?listener.local_addr().ok(), "serving");

        loop {
            match listener.accept().await {
                Ok(transport) => {
                    self.accept(transport);
                }
                Err(TransportError::Closed) => return Ok(()),
                Err(_error) => {
                    #[cfg(feature = "observability")]
                    warn!(error = %_error, "accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Snapshot of live connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.live.lock().values().cloned().collect()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Closes every live connection.
    pub async fn shutdown(&self) {
        let connections = self.connections();
        #[cfg(feature = "observability")]
        info!(count = connections.len(), "shutting down");
        join_all(connections.iter().map(Connection::close)).await;
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.environment.config)
            .field("controllers", &self.environment.controllers)
            .field("connections", &self.connection_count())
            .field("principals", &self.sessions.len())
            .finish()
    }
}
