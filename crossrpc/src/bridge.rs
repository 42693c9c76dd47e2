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

//! The bridge between typed proxy methods and the connection engine.
//!
//! Generated proxies build a [`Call`] from their arguments and hand it to
//! [`invoke`] (for `async fn` methods) or [`invoke_blocking`] (for plain
//! `fn` methods). Both resolve the target [`Connection`] through an
//! [`Invoker`], register the call, queue the request and decode the result.
//!
//! A call ends in exactly one of three ways: a decoded value,
//! [`RpcError::Remote`] carrying the peer's result code, or
//! [`RpcError::Connection`] when the connection died first.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crossrpc::bridge::{Call, invoke};
//! use crossrpc::{Connection, RpcError};
//!
//! async fn authorize(connection: &Connection) -> Result<i64, RpcError> {
//!     let mut call = Call::new(connection.format(), "Auth/Authorize");
//!     call.argument("login", "u1")?.argument("password", "p1")?;
//!     invoke(connection, call).await
//! }
//! ```

use crate::codec::{Argument, RequestEnvelope, Serializer, ValueFormat};
use crate::{Connection, RpcError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::type_name;
use tokio::runtime::{Handle, RuntimeFlavor};

#[cfg(feature = "observability")]
use tracing::debug;

/// Something proxies can send calls through.
#[async_trait]
pub trait Invoker: Send + Sync + 'static {
    /// Returns the connection to send the next call on, establishing one if
    /// needed.
    async fn connection(&self) -> Result<Connection, RpcError>;

    /// Value format for arguments and results.
    fn format(&self) -> ValueFormat;

    /// Runtime that drives blocking calls made outside of any runtime.
    fn runtime(&self) -> Option<Handle>;
}

#[async_trait]
impl Invoker for Connection {
    async fn connection(&self) -> Result<Connection, RpcError> {
        Ok(self.clone())
    }

    fn format(&self) -> ValueFormat {
        Connection::format(self)
    }

    fn runtime(&self) -> Option<Handle> {
        Some(Connection::runtime(self).clone())
    }
}

/// An outgoing call under construction.
#[derive(Debug, Clone)]
pub struct Call {
    format: ValueFormat,
    request: RequestEnvelope,
}

impl Call {
    /// Starts a call to `action` (`"{Controller}/{Method}"`).
    pub fn new(format: ValueFormat, action: impl Into<String>) -> Self {
        Self {
            format,
            request: RequestEnvelope::new(action),
        }
    }

    /// Appends a named argument.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be serialized.
    pub fn argument<T>(&mut self, name: &str, value: &T) -> Result<&mut Self, RpcError>
    where
        T: Serialize + ?Sized,
    {
        let value = self.format.serialize(value)?;
        self.request.arguments.push(Argument::new(name, value));
        Ok(self)
    }

    /// The action being called.
    pub fn action(&self) -> &str {
        &self.request.action
    }

    /// The request built so far.
    pub fn request(&self) -> &RequestEnvelope {
        &self.request
    }
}

/// Sends a call and waits for its typed result.
///
/// # Errors
///
/// See the module documentation for the possible outcomes. A result that
/// does not decode as `R` fails with [`RpcError::Deserialization`].
pub async fn invoke<R, I>(invoker: &I, call: Call) -> Result<R, RpcError>
where
    R: DeserializeOwned,
    I: Invoker + ?Sized,
{
    let connection = invoker.connection().await?;
    let Call { format, request } = call;
    let payload = connection.call_raw(request, type_name::<R>()).await?;
    format.deserialize(&payload).map_err(|error| {
        #[cfg(feature = "observability")]
        debug!(
            connection_id = %connection.id(),
            expected = type_name::<R>(),
            %error,
            "result did not decode"
        );
        RpcError::Deserialization(error)
    })
}

/// Sends a call and blocks the current thread until its typed result arrives.
///
/// Inside a multi-threaded runtime the worker is handed off with
/// [`tokio::task::block_in_place`]. Outside of any runtime the invoker's own
/// runtime drives the call.
///
/// # Errors
///
/// As [`invoke`], plus an internal error when called from a current-thread
/// runtime or with no runtime available at all.
pub fn invoke_blocking<R, I>(invoker: &I, call: Call) -> Result<R, RpcError>
where
    R: DeserializeOwned,
    I: Invoker + ?Sized,
{
    match Handle::try_current() {
        Ok(current) => {
            if current.runtime_flavor() == RuntimeFlavor::CurrentThread {
                return Err(RpcError::internal_message(
                    "blocking calls are not supported on a current-thread runtime",
                ));
            }
            tokio::task::block_in_place(|| current.block_on(invoke(invoker, call)))
        }
        Err(_) => match invoker.runtime() {
            Some(runtime) => runtime.block_on(invoke(invoker, call)),
            None => Err(RpcError::internal_message(
                "blocking call made outside of a Tokio runtime",
            )),
        },
    }
}
