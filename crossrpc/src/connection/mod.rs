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

//! The connection engine.
//!
//! A [`Connection`] is a cheap handle to one live transport. Each connection
//! runs two tasks:
//!
//! - the **receive loop** reassembles messages, completes pending calls and
//!   spawns one handler task per inbound request
//! - the **send loop** drains the outbound queue, writing each message as
//!   back-to-back fragments so messages never interleave
//!
//! Either side may call the other at any time; requests and responses share the
//! transport and are told apart by the header's request flag.
//!
//! # Lifecycle
//!
//! A connection is torn down exactly once, whichever of local
//! [`close`](Connection::close), remote close, a transport failure or a
//! protocol violation comes first. Teardown moves the state to
//! [`Closing`](ConnectionState::Closing), fails every pending call with the
//! cause, detaches the connection from its principal's registry entry and runs
//! the close callbacks. The send loop then closes the transport and publishes
//! [`Closed`](ConnectionState::Closed).
//!
//! # Examples
//!
//! ```rust
//! use crossrpc::connection::{ConnectionBuilder, ConnectionState};
//! use crossrpc::transport::MemoryTransport;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (left, right) = MemoryTransport::pair(16);
//! let client = ConnectionBuilder::new().connect(Box::new(left));
//! let server = ConnectionBuilder::new().accept(Box::new(right));
//! assert_eq!(client.state(), ConnectionState::Open);
//!
//! client.close().await;
//! server.closed().await;
//! assert_eq!(server.state(), ConnectionState::Closed);
//! # }
//! ```

mod builder;
mod framing;
pub mod pending;
mod state;
mod tasks;

pub use self::builder::ConnectionBuilder;
pub use self::state::{ConnectionId, ConnectionState, Role};

pub(crate) use self::builder::Environment;

use self::pending::{PendingCalls, PendingGuard};
use crate::auth::{AuthToken, PrincipalId, TokenClaims};
use crate::codec::{FramingError, RequestEnvelope, ResponseEnvelope, ValueFormat, encode_message};
use crate::dispatch::Dispatcher;
use crate::endpoint::ConnectionConfig;
use crate::metrics::{ConnectionMetrics, MetricsSnapshot};
use crate::transport::TransportMetadata;
use crate::{ConnectionError, RpcError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

type CloseCallback = Box<dyn FnOnce(&ConnectionError) + Send + 'static>;

/// Handle to a live connection.
///
/// Clones share the same connection. Dropping every handle does not close the
/// connection: its tasks keep it alive until it is closed or fails.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    id: ConnectionId,
    role: Role,
    metadata: TransportMetadata,
    environment: Environment,
    dispatcher: Dispatcher,
    pending: PendingCalls,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    state: watch::Sender<ConnectionState>,
    torn_down: AtomicBool,
    cause: OnceLock<ConnectionError>,
    principal: Mutex<Option<PrincipalId>>,
    close_callbacks: Mutex<Option<Vec<CloseCallback>>>,
    metrics: ConnectionMetrics,
    runtime: Handle,
}

impl Connection {
    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Returns which side opened the transport.
    pub fn role(&self) -> Role {
        self.shared.role
    }

    /// Returns the transport's metadata.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.shared.metadata
    }

    /// Returns the configuration the connection runs with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.environment.config
    }

    /// Returns the value format for arguments and results.
    pub fn format(&self) -> ValueFormat {
        self.shared.environment.config.format
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Returns true while calls can be made.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns why the connection ended, once it has.
    pub fn close_reason(&self) -> Option<ConnectionError> {
        self.shared.cause.get().cloned()
    }

    /// Returns a snapshot of the connection's counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Number of outgoing calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    /// Returns the principal this connection is authorized as.
    pub fn principal(&self) -> Option<PrincipalId> {
        *self.shared.principal.lock()
    }

    /// Returns true once the connection has been authorized.
    pub fn is_authorized(&self) -> bool {
        self.principal().is_some()
    }

    /// Closes the connection and waits until the transport is closed.
    ///
    /// Messages already queued are flushed first. Calls still awaiting a
    /// response fail with [`ConnectionError::Closed`]. Closing a connection
    /// that is already closing only waits.
    pub async fn close(&self) {
        self.shared.teardown(ConnectionError::Closed);
        self.closed().await;
    }

    /// Waits until the connection is fully closed.
    pub async fn closed(&self) {
        let mut state = self.shared.state.subscribe();
        // The sender lives in `shared`, so this only ends at Closed.
        let _ = state.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    /// Registers a callback to run once when teardown starts.
    ///
    /// Runs immediately if the connection is already torn down.
    pub fn on_close<F>(&self, callback: F)
    where
        F: FnOnce(&ConnectionError) + Send + 'static,
    {
        let mut callbacks = self.shared.close_callbacks.lock();
        match callbacks.as_mut() {
            Some(callbacks) => callbacks.push(Box::new(callback)),
            None => {
                drop(callbacks);
                let cause = self.close_reason().unwrap_or(ConnectionError::Closed);
                callback(&cause);
            }
        }
    }

    /// Authorizes the connection as `principal` and issues a bearer token.
    ///
    /// On a server connection the connection also joins the principal's
    /// registry entry.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the connection is already authorized; the principal
    ///   is left unchanged
    /// - an internal error if no token codec is configured or sealing fails
    pub fn authorize(&self, principal: PrincipalId) -> Result<AuthToken, RpcError> {
        if self.is_authorized() {
            return Err(already_authorized());
        }
        let codec = self
            .shared
            .environment
            .token_codec
            .as_ref()
            .ok_or_else(|| RpcError::internal_message("no token codec configured"))?;
        let claims = TokenClaims {
            principal,
            expires_at: SystemTime::now() + self.shared.environment.config.token_lifetime,
        };
        let token = codec.seal(&claims)?;
        self.bind_principal(principal)?;
        Ok(token)
    }

    /// Authorizes the connection with a token issued earlier.
    ///
    /// Returns `Ok(false)` for tokens that cannot be opened or have expired.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the connection is already authorized.
    pub fn authorize_with_token(&self, token: &AuthToken) -> Result<bool, RpcError> {
        if self.is_authorized() {
            return Err(already_authorized());
        }
        let Some(codec) = self.shared.environment.token_codec.as_ref() else {
            return Ok(false);
        };
        let Some(claims) = codec.open(token) else {
            #[cfg(feature = "observability")]
            debug!(connection_id = %self.id(), "rejected token that could not be opened");
            return Ok(false);
        };
        if claims.is_expired_at(SystemTime::now()) {
            #[cfg(feature = "observability")]
            debug!(connection_id = %self.id(), principal = %claims.principal, "rejected expired token");
            return Ok(false);
        }
        self.bind_principal(claims.principal)?;
        Ok(true)
    }

    fn bind_principal(&self, principal: PrincipalId) -> Result<(), RpcError> {
        {
            let mut slot = self.shared.principal.lock();
            if slot.is_some() {
                return Err(already_authorized());
            }
            *slot = Some(principal);
        }

        if let Some(sessions) = &self.shared.environment.sessions {
            sessions.attach(principal, self.clone());
            // Teardown may have run between binding and attaching.
            if self.state().is_terminating() {
                sessions.detach(principal, self.id());
            }
        }

        #[cfg(feature = "observability")]
        info!(connection_id = %self.id(), principal = %principal, "connection authorized");
        Ok(())
    }

    /// Sends a request and waits for its raw result payload.
    pub(crate) async fn call_raw(
        &self,
        request: RequestEnvelope,
        expected_type: &'static str,
    ) -> Result<Vec<u8>, RpcError> {
        let result = self.send_and_wait(request, expected_type).await;
        if result.is_err() {
            self.shared.metrics.record_calls_failed(1);
        }
        result
    }

    async fn send_and_wait(
        &self,
        request: RequestEnvelope,
        expected_type: &'static str,
    ) -> Result<Vec<u8>, RpcError> {
        let shared = &self.shared;
        let payload = request.encode();
        let max = shared.environment.config.max_message_size;
        if payload.len() > max {
            return Err(FramingError::MessageTooLarge {
                size: payload.len(),
                max,
            }
            .into());
        }

        let registration = shared.pending.register(&request.action, expected_type)?;
        let _guard = PendingGuard::new(&shared.pending, &registration);
        let message = encode_message(true, registration.correlation_id, &payload)?;

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %shared.id,
            correlation_id = registration.correlation_id,
            action = %request.action,
            "sending request"
        );

        if shared.outbound.send(message).is_err() {
            return Err(self.connection_failure());
        }
        shared.metrics.record_request_sent();

        let outcome = match shared.environment.config.call_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, registration.receiver).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        #[cfg(feature = "observability")]
                        warn!(
                            connection_id = %shared.id,
                            action = %request.action,
                            ?timeout,
                            "call timed out"
                        );
                        return Err(RpcError::Timeout {
                            action: request.action,
                            timeout,
                        });
                    }
                }
            }
            None => registration.receiver.await,
        };

        // A dropped slot means the entry was removed without being resolved.
        outcome.unwrap_or_else(|_| Err(self.connection_failure()))
    }

    fn connection_failure(&self) -> RpcError {
        RpcError::Connection(self.close_reason().unwrap_or(ConnectionError::Closed))
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }
}

fn already_authorized() -> RpcError {
    RpcError::bad_request("connection is already authorized")
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("role", &self.shared.role)
            .field("transport", &self.shared.metadata.transport_type)
            .field("state", &self.state())
            .field("principal", &self.principal())
            .finish()
    }
}

impl Shared {
    /// Starts teardown. Returns false if another cause got there first.
    pub(crate) fn teardown(&self, cause: ConnectionError) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.cause.set(cause.clone());
        self.state.send_replace(ConnectionState::Closing);

        #[cfg(feature = "observability")]
        {
            if cause.is_orderly() {
                info!(connection_id = %self.id, role = %self.role, %cause, "connection closing");
            } else {
                warn!(connection_id = %self.id, role = %self.role, %cause, "connection failed");
            }
        }

        let failed = self.pending.drain_all(cause.clone());
        #[cfg(feature = "observability")]
        {
            if failed > 0 {
                debug!(connection_id = %self.id, failed, "failed pending calls");
            }
        }
        #[cfg(not(feature = "observability"))]
        let _ = failed;

        if let Some(sessions) = &self.environment.sessions {
            let principal = *self.principal.lock();
            if let Some(principal) = principal {
                sessions.detach(principal, self.id);
            }
        }

        let callbacks = self.close_callbacks.lock().take().unwrap_or_default();
        for callback in callbacks {
            callback(&cause);
        }
        true
    }

    /// Queues a response for `correlation_id`.
    pub(crate) fn respond(&self, correlation_id: i16, response: ResponseEnvelope) {
        let max = self.environment.config.max_message_size;
        let mut payload = response.encode();
        if payload.len() > max {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %self.id,
                correlation_id,
                size = payload.len(),
                max,
                "response exceeds max_message_size"
            );
            payload = RpcError::internal_message("response too large")
                .into_response()
                .encode();
        }

        match encode_message(false, correlation_id, &payload) {
            Ok(message) => {
                if self.outbound.send(message).is_ok() {
                    self.metrics.record_response_sent();
                }
            }
            Err(_error) => {
                #[cfg(feature = "observability")]
                warn!(connection_id = %self.id, correlation_id, error = %_error, "could not frame response");
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

/// Resolves once the connection starts tearing down.
async fn terminating(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(|state| state.is_terminating()).await;
}
