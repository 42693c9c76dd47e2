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

//! Fixed-size frame header.
//!
//! Every message on the wire starts with the same seven bytes:
//!
//! ```text
//! +------------+----------------+------------------+
//! | is_request | correlation_id | content_length   |
//! | u8 (0/1)   | i16 BE         | i32 BE           |
//! +------------+----------------+------------------+
//! ```
//!
//! The payload (a request or response envelope) follows immediately and is
//! exactly `content_length` bytes long.

use super::FramingError;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 7;

/// Decoded frame header.
///
/// # Examples
///
/// ```rust
/// use crossrpc::codec::{FrameHeader, HEADER_SIZE};
///
/// let header = FrameHeader::request(42, 128);
/// let bytes = header.encode();
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// assert_eq!(FrameHeader::decode(&bytes).unwrap(), header);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    is_request: bool,
    correlation_id: i16,
    content_length: i32,
}

impl FrameHeader {
    /// Creates a header from its raw parts.
    #[must_use]
    pub const fn new(is_request: bool, correlation_id: i16, content_length: i32) -> Self {
        Self {
            is_request,
            correlation_id,
            content_length,
        }
    }

    /// Creates a header for an outbound request.
    #[must_use]
    pub const fn request(correlation_id: i16, content_length: i32) -> Self {
        Self::new(true, correlation_id, content_length)
    }

    /// Creates a header for a response to `correlation_id`.
    #[must_use]
    pub const fn response(correlation_id: i16, content_length: i32) -> Self {
        Self::new(false, correlation_id, content_length)
    }

    /// Returns true if the payload is a request envelope.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.is_request
    }

    /// Returns the correlation id binding a request to its response.
    #[must_use]
    pub const fn correlation_id(&self) -> i16 {
        self.correlation_id
    }

    /// Returns the declared payload length.
    #[must_use]
    pub const fn content_length(&self) -> i32 {
        self.content_length
    }

    /// Returns the total message length, header included.
    ///
    /// Only meaningful for headers produced by [`FrameHeader::decode`], which
    /// rejects negative lengths.
    #[must_use]
    pub const fn message_len(&self) -> usize {
        HEADER_SIZE + self.content_length as usize
    }

    /// Encodes the header into its fixed wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = u8::from(self.is_request);
        bytes[1..3].copy_from_slice(&self.correlation_id.to_be_bytes());
        bytes[3..7].copy_from_slice(&self.content_length.to_be_bytes());
        bytes
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Extra trailing bytes are ignored; they belong to the payload.
    ///
    /// # Errors
    ///
    /// Fails with [`FramingError::Truncated`] on short input,
    /// [`FramingError::InvalidFlag`] when the request flag is not a boolean and
    /// [`FramingError::NegativeLength`] for negative content lengths.
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FramingError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let is_request = match bytes[0] {
            0 => false,
            1 => true,
            other => return Err(FramingError::InvalidFlag(other)),
        };
        let correlation_id = i16::from_be_bytes([bytes[1], bytes[2]]);
        let content_length = i32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        if content_length < 0 {
            return Err(FramingError::NegativeLength(content_length));
        }

        Ok(Self {
            is_request,
            correlation_id,
            content_length,
        })
    }
}

/// Encodes a complete message: header followed by `payload`.
///
/// # Errors
///
/// Fails with [`FramingError::MessageTooLarge`] if the payload does not fit the
/// 31-bit length field.
pub fn encode_message(
    is_request: bool,
    correlation_id: i16,
    payload: &[u8],
) -> Result<Vec<u8>, FramingError> {
    let content_length =
        i32::try_from(payload.len()).map_err(|_| FramingError::MessageTooLarge {
            size: payload.len(),
            max: i32::MAX as usize,
        })?;
    let header = FrameHeader::new(is_request, correlation_id, content_length);

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.extend_from_slice(&header.encode());
    message.extend_from_slice(payload);
    Ok(message)
}
