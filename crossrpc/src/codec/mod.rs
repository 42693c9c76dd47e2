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

//! Wire codec.
//!
//! A message is a fixed seven byte [`FrameHeader`] followed by
//! `content_length` payload bytes. The payload is either a
//! [`RequestEnvelope`] or a [`ResponseEnvelope`], depending on the header's
//! request flag. Argument and result values inside envelopes are encoded by a
//! [`Serializer`], selected per connection through [`ValueFormat`].
//!
//! Header decoding fails with [`FramingError`], which is fatal to the
//! connection. Payload decoding fails with [`DeserializationError`], which only
//! affects the message concerned.
//!
//! # Examples
//!
//! ```rust
//! use crossrpc::codec::{encode_message, FrameHeader, ResponseEnvelope, ResultCode, HEADER_SIZE};
//!
//! let payload = ResponseEnvelope::failure(ResultCode::Unauthorized, "sign in first").encode();
//! let message = encode_message(false, 7, &payload).unwrap();
//!
//! let header = FrameHeader::decode(&message).unwrap();
//! assert!(!header.is_request());
//! let response = ResponseEnvelope::decode(&message[HEADER_SIZE..]).unwrap();
//! assert_eq!(response.code(), ResultCode::Unauthorized);
//! ```

mod envelope;
mod error;
mod format;
mod header;
#[cfg(feature = "json")]
mod json;
#[cfg(feature = "postcard")]
mod postcard;
mod result_code;
mod traits;

pub use self::envelope::{Argument, RequestEnvelope, ResponseEnvelope};
pub use self::error::{DeserializationError, FramingError, SerializationError};
pub use self::format::ValueFormat;
pub use self::header::{FrameHeader, HEADER_SIZE, encode_message};
#[cfg(feature = "json")]
pub use self::json::JsonSerializer;
#[cfg(feature = "postcard")]
pub use self::postcard::PostcardSerializer;
pub use self::result_code::ResultCode;
pub use self::traits::Serializer;
