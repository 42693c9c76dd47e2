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

//! JSON value serializer.

use super::{DeserializationError, SerializationError, Serializer};

/// Self-describing JSON serializer backed by `serde_json`.
///
/// This is the default value format. Being self-describing, it tolerates
/// additive changes to DTOs on either side of a connection.
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Creates a compact JSON serializer.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Produces indented JSON, which is handy when capturing traffic for debugging.
    #[must_use]
    pub fn with_pretty_print(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized,
    {
        if self.pretty {
            serde_json::to_vec_pretty(value).map_err(Into::into)
        } else {
            serde_json::to_vec(value).map_err(Into::into)
        }
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(Into::into)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Upload {
        owner: Option<u64>,
        uri: String,
        created: SystemTime,
        thumbnail: Vec<u8>,
        tags: HashMap<String, i32>,
    }

    #[test]
    fn test_declared_shapes_roundtrip() {
        let serializer = JsonSerializer::new();
        let upload = Upload {
            owner: None,
            uri: "https://example.com/a.png?size=2".to_string(),
            created: UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
            thumbnail: vec![0, 1, 254, 255],
            tags: HashMap::from([("cat".to_string(), 1)]),
        };
        let bytes = serializer.serialize(&upload).unwrap();
        let decoded: Upload = serializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, upload);
    }

    #[test]
    fn test_pretty_print() {
        let serializer = JsonSerializer::new().with_pretty_print();
        let bytes = serializer.serialize(&vec![1, 2]).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains('\n'));
        assert_eq!(serializer.name(), "json");
    }

    #[test]
    fn test_type_mismatch() {
        let serializer = JsonSerializer::new();
        let bytes = serializer.serialize("text").unwrap();
        let result: Result<u32, _> = serializer.deserialize(&bytes);
        assert!(result.unwrap_err().to_string().contains("JSON"));
    }
}
