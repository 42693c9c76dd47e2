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

//! Codec error types.
//!
//! Framing errors and payload errors are kept apart on purpose: a [`FramingError`]
//! means the byte stream can no longer be trusted and the connection must be torn
//! down, while a [`DeserializationError`] only affects the single message that
//! failed to decode.

use std::fmt;
use thiserror::Error;

/// A malformed or inconsistent frame.
///
/// Always fatal to the connection that observed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Fewer bytes were available than the fixed header size.
    #[error("insufficient header bytes: expected {expected}, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The request flag byte was neither 0 nor 1.
    #[error("invalid request flag byte {0:#04x}")]
    InvalidFlag(u8),

    /// The header declared a negative content length.
    #[error("negative content length {0}")]
    NegativeLength(i32),

    /// The message exceeds the configured maximum size.
    #[error("message of {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge {
        /// Declared or actual message size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The transport signalled end-of-message before `content_length` bytes arrived.
    #[error("message ended after {actual} of {expected} bytes")]
    IncompleteMessage {
        /// Total bytes the header announced (header included).
        expected: usize,
        /// Bytes received when the message ended.
        actual: usize,
    },

    /// More bytes arrived for a message than its header announced.
    #[error("message overran its declared length: expected {expected} bytes, got {actual}")]
    TrailingBytes {
        /// Total bytes the header announced (header included).
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
}

/// Error that occurs while serializing a value or envelope.
#[derive(Debug)]
pub struct SerializationError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SerializationError {
    /// Creates a new serialization error with a message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use crossrpc::codec::SerializationError;
    ///
    /// let error = SerializationError::new("value is not representable");
    /// assert!(error.to_string().contains("not representable"));
    /// ```
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new serialization error with a message and source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message without its cause.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serialization error: {}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error that occurs while decoding a payload.
///
/// Carries the original cause, if any, so the receiving side can report what
/// went wrong without tearing down the connection.
///
/// # Examples
///
/// ```rust
/// use crossrpc::codec::RequestEnvelope;
///
/// let result = RequestEnvelope::decode(&[0xFF, 0xFF]);
/// assert!(result.is_err());
/// ```
#[derive(Debug)]
pub struct DeserializationError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DeserializationError {
    /// Creates a new deserialization error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new deserialization error with a message and source.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use crossrpc::codec::DeserializationError;
    /// use std::io;
    ///
    /// let io_error = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
    /// let error = DeserializationError::with_source("argument list", io_error);
    /// assert!(error.to_string().contains("short read"));
    /// ```
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message without its cause.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deserialization error: {}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for DeserializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "postcard")]
impl From<postcard::Error> for SerializationError {
    fn from(err: postcard::Error) -> Self {
        Self::with_source("Postcard serialization failed", err)
    }
}

#[cfg(feature = "postcard")]
impl From<postcard::Error> for DeserializationError {
    fn from(err: postcard::Error) -> Self {
        Self::with_source("Postcard deserialization failed", err)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("JSON serialization failed", err)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for DeserializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("JSON deserialization failed", err)
    }
}

impl From<std::string::FromUtf8Error> for DeserializationError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::with_source("invalid UTF-8 string", err)
    }
}
