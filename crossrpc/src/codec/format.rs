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

//! Runtime selection of the value format used by a connection.

use super::{DeserializationError, SerializationError, Serializer};

/// The value format negotiated out of band for a connection.
///
/// Both peers must be configured with the same format. `ValueFormat` is
/// itself a [`Serializer`] that forwards to the selected implementation, so it
/// can be copied into request contexts and proxies freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueFormat {
    /// Self-describing JSON (see [`JsonSerializer`](super::JsonSerializer)).
    #[cfg(feature = "json")]
    #[default]
    Json,
    /// Compact postcard (see [`PostcardSerializer`](super::PostcardSerializer)).
    #[cfg(feature = "postcard")]
    #[cfg_attr(not(feature = "json"), default)]
    Postcard,
}

impl Serializer for ValueFormat {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized,
    {
        match self {
            #[cfg(feature = "json")]
            ValueFormat::Json => super::JsonSerializer::new().serialize(value),
            #[cfg(feature = "postcard")]
            ValueFormat::Postcard => super::PostcardSerializer::new().serialize(value),
        }
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned,
    {
        match self {
            #[cfg(feature = "json")]
            ValueFormat::Json => super::JsonSerializer::new().deserialize(bytes),
            #[cfg(feature = "postcard")]
            ValueFormat::Postcard => super::PostcardSerializer::new().deserialize(bytes),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "json")]
            ValueFormat::Json => "json",
            #[cfg(feature = "postcard")]
            ValueFormat::Postcard => "postcard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "json")]
    #[test]
    fn test_default_is_json() {
        assert_eq!(ValueFormat::default(), ValueFormat::Json);
        let bytes = ValueFormat::Json.serialize(&Some(5u8)).unwrap();
        assert_eq!(bytes, b"5");
        let value: Option<u8> = ValueFormat::Json.deserialize(b"null").unwrap();
        assert_eq!(value, None);
    }

    #[cfg(feature = "postcard")]
    #[test]
    fn test_postcard_forwarding() {
        let bytes = ValueFormat::Postcard.serialize(&300u16).unwrap();
        let value: u16 = ValueFormat::Postcard.deserialize(&bytes).unwrap();
        assert_eq!(value, 300);
        assert_eq!(ValueFormat::Postcard.name(), "postcard");
    }
}
