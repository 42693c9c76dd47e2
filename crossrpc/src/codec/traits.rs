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

//! The [`Serializer`] trait for argument and result values.

use super::{DeserializationError, SerializationError};

/// Encodes and decodes individual argument and result values.
///
/// Envelopes are always encoded by the codec itself; a `Serializer` only ever
/// sees the values inside them. Implementations must be thread-safe.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "json")]
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use crossrpc::codec::{JsonSerializer, Serializer};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Profile {
///     id: u32,
///     nick: Option<String>,
/// }
///
/// let serializer = JsonSerializer::default();
/// let profile = Profile { id: 42, nick: None };
/// let bytes = serializer.serialize(&profile)?;
/// let decoded: Profile = serializer.deserialize(&bytes)?;
/// assert_eq!(profile, decoded);
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "json"))]
/// # fn main() {}
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Serializes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the value cannot be represented.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized;

    /// Deserializes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] if the bytes are not a valid `T`.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned;

    /// Returns a short name for logs, such as `"json"`.
    fn name(&self) -> &'static str;
}
