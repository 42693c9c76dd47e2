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

//! Argument binding.

use super::normalize_member;
use crate::codec::{Argument, Serializer, ValueFormat};
use crate::error::RemoteError;
use crate::RpcError;
use serde::de::DeserializeOwned;

/// The arguments of one inbound request.
///
/// Parameters are looked up by name, ignoring case and underscores. Each
/// argument can be taken once; if a request repeats a name, the first
/// occurrence wins. Arguments the method never asks for are ignored.
#[derive(Debug)]
pub struct Arguments {
    format: ValueFormat,
    values: Vec<(String, Vec<u8>)>,
}

impl Arguments {
    /// Wraps the arguments of a request.
    pub fn new(format: ValueFormat, arguments: Vec<Argument>) -> Self {
        Self {
            format,
            values: arguments
                .into_iter()
                .map(|argument| (normalize_member(&argument.name), argument.value))
                .collect(),
        }
    }

    /// Takes and decodes a required argument.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the argument is missing
    /// - `InvalidRequestFormat` if it does not decode as `T`
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, RpcError> {
        match self.take_raw(name) {
            Some(bytes) => self.decode(name, &bytes),
            None => Err(RemoteError::bad_request(format!("missing argument '{}'", name)).into()),
        }
    }

    /// Takes and decodes an argument, substituting `T::default()` if it is missing.
    ///
    /// # Errors
    ///
    /// `InvalidRequestFormat` if the argument is present but does not decode as `T`.
    pub fn take_or_default<T: DeserializeOwned + Default>(
        &mut self,
        name: &str,
    ) -> Result<T, RpcError> {
        match self.take_raw(name) {
            Some(bytes) => self.decode(name, &bytes),
            None => Ok(T::default()),
        }
    }

    /// Takes an argument's raw bytes.
    pub fn take_raw(&mut self, name: &str) -> Option<Vec<u8>> {
        let key = normalize_member(name);
        let position = self.values.iter().position(|(candidate, _)| *candidate == key)?;
        Some(self.values.remove(position).1)
    }

    /// Returns true if an argument with this name is still present.
    pub fn contains(&self, name: &str) -> bool {
        let key = normalize_member(name);
        self.values.iter().any(|(candidate, _)| *candidate == key)
    }

    /// Number of arguments not yet taken.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if every argument was taken.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn decode<T: DeserializeOwned>(&self, name: &str, bytes: &[u8]) -> Result<T, RpcError> {
        self.format.deserialize(bytes).map_err(|error| {
            RemoteError::invalid_request_format(format!(
                "argument '{}' is not a valid {}: {}",
                name,
                std::any::type_name::<T>(),
                error.message()
            ))
            .into()
        })
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::codec::ResultCode;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Filter {
        limit: u32,
    }

    fn arguments(pairs: &[(&str, &str)]) -> Arguments {
        Arguments::new(
            ValueFormat::Json,
            pairs
                .iter()
                .map(|(name, value)| Argument::new(*name, value.as_bytes().to_vec()))
                .collect(),
        )
    }

    #[test]
    fn test_take_by_normalized_name() {
        let mut args = arguments(&[("UserName", "\"u1\""), ("max_count", "3")]);
        assert_eq!(args.take::<String>("user_name").unwrap(), "u1");
        assert_eq!(args.take::<u32>("MaxCount").unwrap(), 3);
        assert!(args.is_empty());
    }

    #[test]
    fn test_missing_argument_is_bad_request() {
        let mut args = arguments(&[]);
        let err = args.take::<String>("login").unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::BadRequest));
        assert!(err.to_string().contains("login"));
    }

    #[test]
    fn test_missing_argument_defaults() {
        let mut args = arguments(&[]);
        assert_eq!(args.take_or_default::<Filter>("filter").unwrap(), Filter::default());
        assert_eq!(args.take_or_default::<Option<u8>>("page").unwrap(), None);
    }

    #[test]
    fn test_undecodable_argument() {
        let mut args = arguments(&[("limit", "\"many\"")]);
        let err = args.take::<u32>("limit").unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::InvalidRequestFormat));

        let mut args = arguments(&[("filter", "{}")]);
        let err = args.take_or_default::<Filter>("filter").unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::InvalidRequestFormat));
    }

    #[test]
    fn test_first_duplicate_wins_and_extras_ignored() {
        let mut args = arguments(&[("id", "1"), ("id", "2"), ("unused", "null")]);
        assert_eq!(args.take::<u8>("id").unwrap(), 1);
        assert!(args.contains("ID"));
        assert_eq!(args.len(), 2);
    }
}
