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

//! Top-level error types.
//!
//! Errors are layered by who has to act on them:
//!
//! 1. **Connection**: [`ConnectionError`], the reason a connection died. Fatal,
//!    shared by every call that was outstanding at the time.
//! 2. **Remote**: [`RemoteError`], a result code and message produced by the
//!    peer. Crosses the wire verbatim.
//! 3. **Call**: [`RpcError`], everything a single call can end with.
//!
//! A proxy call ends in exactly one of: a typed value, an
//! [`RpcError::Remote`], or an [`RpcError::Connection`]. The remaining
//! variants cover local failures such as timeouts or values that cannot be
//! encoded.
//!
//! # Examples
//!
//! ```rust
//! use crossrpc::{ConnectionError, RemoteError, ResultCode, RpcError};
//!
//! let remote: RpcError = RemoteError::bad_request("login taken").into();
//! assert_eq!(remote.code(), Some(ResultCode::BadRequest));
//!
//! let dropped: RpcError = ConnectionError::RemoteClosed.into();
//! assert!(dropped.is_connection_failure());
//! assert_eq!(dropped.code(), None);
//! ```

use crate::codec::{
    DeserializationError, FramingError, ResponseEnvelope, ResultCode, SerializationError,
};
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Message sent to the peer in place of any undisclosed failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// A failure declared by the remote side, with an explicit result code.
///
/// Controllers return it to reject a call with a specific code; callers
/// receive it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    code: ResultCode,
    message: String,
}

impl RemoteError {
    /// Creates a remote error.
    ///
    /// A code of [`ResultCode::Ok`] is promoted to [`ResultCode::InternalError`].
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        let code = if code.is_ok() {
            ResultCode::InternalError
        } else {
            code
        };
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for [`ResultCode::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ResultCode::BadRequest, message)
    }

    /// Shorthand for [`ResultCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Unauthorized, message)
    }

    /// Shorthand for [`ResultCode::ActionNotFound`].
    pub fn action_not_found(message: impl Into<String>) -> Self {
        Self::new(ResultCode::ActionNotFound, message)
    }

    /// Shorthand for [`ResultCode::InvalidRequestFormat`].
    pub fn invalid_request_format(message: impl Into<String>) -> Self {
        Self::new(ResultCode::InvalidRequestFormat, message)
    }

    /// Returns the result code.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RemoteError> for ResponseEnvelope {
    fn from(error: RemoteError) -> Self {
        ResponseEnvelope::failure(error.code, error.message)
    }
}

/// Why a connection ended.
///
/// Cloned into every call that was outstanding when the connection died.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    RemoteClosed,

    /// The transport failed.
    #[error("transport failure: {0}")]
    Transport(#[source] Arc<TransportError>),

    /// The peer sent a malformed frame.
    #[error("protocol violation: {0}")]
    Framing(#[from] FramingError),

    /// A lazily connecting client could not reach its peer.
    #[error("failed to connect: {0}")]
    ConnectFailed(#[source] Arc<TransportError>),
}

impl ConnectionError {
    /// Returns true if the connection was closed on purpose by either side.
    pub fn is_orderly(&self) -> bool {
        matches!(self, ConnectionError::Closed | ConnectionError::RemoteClosed)
    }
}

impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Closed => ConnectionError::RemoteClosed,
            other => ConnectionError::Transport(Arc::new(other)),
        }
    }
}

/// Everything a single call can end with.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The peer answered with a non-`Ok` result code.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The connection carrying the call died.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The call's deadline passed before a response arrived.
    #[error("call to {action} timed out after {timeout:?}")]
    Timeout {
        /// Action that was called.
        action: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// An argument or result could not be encoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A response or result could not be decoded.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// The encoded message does not fit the frame limits.
    #[error("message rejected: {0}")]
    Framing(#[from] FramingError),

    /// No correlation id is available for a new call.
    #[error("too many pending calls (limit {limit})")]
    TooManyPendingCalls {
        /// Active limit.
        limit: usize,
    },

    /// A local failure with no result code of its own.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl RpcError {
    /// Creates an [`RpcError::Remote`].
    pub fn remote(code: ResultCode, message: impl Into<String>) -> Self {
        RpcError::Remote(RemoteError::new(code, message))
    }

    /// Creates an [`RpcError::Remote`] with [`ResultCode::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        RpcError::Remote(RemoteError::bad_request(message))
    }

    /// Wraps an arbitrary error as [`RpcError::Internal`].
    ///
    /// Controllers use this for failures the peer must not see in detail.
    pub fn internal(error: impl StdError + Send + Sync + 'static) -> Self {
        RpcError::Internal {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates an [`RpcError::Internal`] from a message.
    pub fn internal_message(message: impl Into<String>) -> Self {
        RpcError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the remote result code, if the peer produced this error.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            RpcError::Remote(remote) => Some(remote.code()),
            _ => None,
        }
    }

    /// Returns the remote error, if any.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            RpcError::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    /// Returns true if the call failed because its connection died.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, RpcError::Connection(_))
    }

    /// Returns true if retrying the call on a new connection could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RpcError::Connection(_) | RpcError::Timeout { .. } => true,
            RpcError::TooManyPendingCalls { .. } => true,
            _ => false,
        }
    }

    /// Converts the error into the response sent back to a caller.
    ///
    /// Only [`RpcError::Remote`] keeps its code and message; every other error is
    /// reported as [`ResultCode::InternalError`] with a generic message.
    pub fn into_response(self) -> ResponseEnvelope {
        match self {
            RpcError::Remote(remote) => remote.into(),
            _ => ResponseEnvelope::failure(ResultCode::InternalError, INTERNAL_ERROR_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let error = RemoteError::unauthorized("sign in first");
        assert_eq!(error.to_string(), "Unauthorized: sign in first");
        assert_eq!(error.code(), ResultCode::Unauthorized);
        assert_eq!(error.message(), "sign in first");
    }

    #[test]
    fn test_remote_error_never_ok() {
        assert_eq!(
            RemoteError::new(ResultCode::Ok, "x").code(),
            ResultCode::InternalError
        );
    }

    #[test]
    fn test_transport_closed_maps_to_remote_closed() {
        let error: ConnectionError = TransportError::Closed.into();
        assert!(matches!(error, ConnectionError::RemoteClosed));
        assert!(error.is_orderly());

        let error: ConnectionError = TransportError::FrameTooLarge { size: 2, max: 1 }.into();
        assert!(matches!(error, ConnectionError::Transport(_)));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_remote_error_is_forwarded_verbatim() {
        let response = RpcError::bad_request("login taken").into_response();
        assert_eq!(
            response,
            ResponseEnvelope::failure(ResultCode::BadRequest, "login taken")
        );
    }

    #[test]
    fn test_other_errors_hide_detail() {
        let secret = std::io::Error::other("db password is hunter2");
        let response = RpcError::internal(secret).into_response();
        match response {
            ResponseEnvelope::Failure { code, message } => {
                assert_eq!(code, ResultCode::InternalError);
                assert_eq!(message, INTERNAL_ERROR_MESSAGE);
            }
            ResponseEnvelope::Success(_) => panic!("expected failure"),
        }

        let response = RpcError::from(ConnectionError::Closed).into_response();
        assert_eq!(response.code(), ResultCode::InternalError);
    }

    #[test]
    fn test_classification() {
        let timeout = RpcError::Timeout {
            action: "Home/Slow".to_string(),
            timeout: Duration::from_millis(5),
        };
        assert!(timeout.is_recoverable());
        assert!(!timeout.is_connection_failure());
        assert!(timeout.to_string().contains("Home/Slow"));

        let remote = RpcError::remote(ResultCode::ActionNotFound, "nope");
        assert!(!remote.is_recoverable());
        assert_eq!(remote.as_remote().map(RemoteError::code), Some(ResultCode::ActionNotFound));
    }
}
