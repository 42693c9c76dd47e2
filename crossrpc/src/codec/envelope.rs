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

//! Request and response envelopes.
//!
//! Request payload:
//!
//! ```text
//! [u32 len][action utf8][u32 count] { [u32 len][name utf8][u32 len][value bytes] }*
//! ```
//!
//! Response payload:
//!
//! ```text
//! [u8 result_code][serialized result | utf8 error message]
//! ```
//!
//! Argument and result values are opaque bytes here; they are produced and
//! consumed by a [`Serializer`](super::Serializer).

use super::{DeserializationError, ResultCode};

/// A named, already-serialized argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Parameter name as declared by the caller.
    pub name: String,
    /// Serialized value.
    pub value: Vec<u8>,
}

impl Argument {
    /// Creates an argument from a name and serialized value.
    pub fn new(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An inbound or outbound call.
///
/// # Examples
///
/// ```rust
/// use crossrpc::codec::{Argument, RequestEnvelope};
///
/// let request = RequestEnvelope::new("Auth/Authorize")
///     .with_argument(Argument::new("login", b"\"u1\"".to_vec()));
/// let decoded = RequestEnvelope::decode(&request.encode()).unwrap();
/// assert_eq!(decoded, request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// `"{Controller}/{Method}"`, or just `"{Method}"` for the default controller.
    pub action: String,
    /// Arguments in call order.
    pub arguments: Vec<Argument>,
}

impl RequestEnvelope {
    /// Creates an envelope with no arguments.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            arguments: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Encodes the envelope into a request payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let capacity = 8
            + self.action.len()
            + self
                .arguments
                .iter()
                .map(|arg| 8 + arg.name.len() + arg.value.len())
                .sum::<usize>();
        let mut out = Vec::with_capacity(capacity);

        write_bytes(&mut out, self.action.as_bytes());
        write_len(&mut out, self.arguments.len());
        for argument in &self.arguments {
            write_bytes(&mut out, argument.name.as_bytes());
            write_bytes(&mut out, &argument.value);
        }
        out
    }

    /// Decodes a request payload.
    ///
    /// # Errors
    ///
    /// Fails if the payload is short, contains invalid UTF-8 or has trailing bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut reader = Reader::new(payload);
        let action = reader.read_string("action name")?;
        let count = reader.read_len("argument count")?;

        // Every argument needs at least two length prefixes.
        if count > reader.remaining() / 8 {
            return Err(DeserializationError::new(format!(
                "argument count {} exceeds payload size",
                count
            )));
        }

        let mut arguments = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader.read_string("argument name")?;
            let value = reader.read_bytes("argument value")?.to_vec();
            arguments.push(Argument { name, value });
        }
        reader.finish()?;

        Ok(Self { action, arguments })
    }
}

/// The outcome of a call as sent back to the caller.
///
/// Exactly one of result payload or error message exists, selected by the
/// result code. [`ResponseEnvelope::failure`] never produces a failure tagged
/// [`ResultCode::Ok`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEnvelope {
    /// `Ok` with a serialized result.
    Success(Vec<u8>),
    /// Any other code with a human readable message.
    Failure {
        /// Non-`Ok` result code.
        code: ResultCode,
        /// Message forwarded to the caller.
        message: String,
    },
}

impl ResponseEnvelope {
    /// Creates a successful response.
    #[must_use]
    pub fn success(result: Vec<u8>) -> Self {
        ResponseEnvelope::Success(result)
    }

    /// Creates a failed response.
    ///
    /// A `code` of [`ResultCode::Ok`] is promoted to [`ResultCode::InternalError`]
    /// since an `Ok` response must carry a result.
    #[must_use]
    pub fn failure(code: ResultCode, message: impl Into<String>) -> Self {
        let code = if code.is_ok() {
            ResultCode::InternalError
        } else {
            code
        };
        ResponseEnvelope::Failure {
            code,
            message: message.into(),
        }
    }

    /// Returns the result code.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            ResponseEnvelope::Success(_) => ResultCode::Ok,
            ResponseEnvelope::Failure { code, .. } => *code,
        }
    }

    /// Encodes the envelope into a response payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ResponseEnvelope::Success(result) => {
                let mut out = Vec::with_capacity(1 + result.len());
                out.push(ResultCode::Ok.as_u8());
                out.extend_from_slice(result);
                out
            }
            ResponseEnvelope::Failure { code, message } => {
                let mut out = Vec::with_capacity(1 + message.len());
                out.push(code.as_u8());
                out.extend_from_slice(message.as_bytes());
                out
            }
        }
    }

    /// Decodes a response payload.
    ///
    /// # Errors
    ///
    /// Fails on an empty payload, an unknown result code or a non UTF-8 message.
    pub fn decode(payload: &[u8]) -> Result<Self, DeserializationError> {
        let (&code_byte, rest) = payload
            .split_first()
            .ok_or_else(|| DeserializationError::new("response payload is missing its result code"))?;
        let code = ResultCode::from_u8(code_byte).ok_or_else(|| {
            DeserializationError::new(format!("unknown result code {}", code_byte))
        })?;

        if code.is_ok() {
            Ok(ResponseEnvelope::Success(rest.to_vec()))
        } else {
            let message = String::from_utf8(rest.to_vec())?;
            Ok(ResponseEnvelope::Failure { code, message })
        }
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    // Lengths are bounded by the frame's i32 content length.
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn read_len(&mut self, what: &str) -> Result<usize, DeserializationError> {
        if self.remaining() < 4 {
            return Err(DeserializationError::new(format!(
                "unexpected end of payload reading {}",
                what
            )));
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[self.position..self.position + 4]);
        self.position += 4;
        Ok(u32::from_be_bytes(raw) as usize)
    }

    fn read_bytes(&mut self, what: &str) -> Result<&'a [u8], DeserializationError> {
        let len = self.read_len(what)?;
        if self.remaining() < len {
            return Err(DeserializationError::new(format!(
                "{} declares {} bytes but only {} remain",
                what,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_string(&mut self, what: &str) -> Result<String, DeserializationError> {
        let bytes = self.read_bytes(what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DeserializationError::with_source(format!("{} is not valid UTF-8", what), e))
    }

    fn finish(self) -> Result<(), DeserializationError> {
        if self.remaining() != 0 {
            return Err(DeserializationError::new(format!(
                "{} trailing bytes after request envelope",
                self.remaining()
            )));
        }
        Ok(())
    }
}
