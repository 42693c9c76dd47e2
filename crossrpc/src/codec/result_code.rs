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

//! Response result codes.

use std::fmt;

/// Outcome of a remote call as carried in the first byte of a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    /// The call succeeded and a serialized result follows.
    Ok = 0,
    /// The request was understood but rejected by the callee.
    BadRequest = 1,
    /// The connection is not authorized for this action.
    Unauthorized = 2,
    /// No such controller or method.
    ActionNotFound = 3,
    /// The request payload or one of its arguments could not be decoded.
    ///
    /// Also known as *unprocessable entity*.
    InvalidRequestFormat = 4,
    /// The callee failed for a reason it does not disclose.
    InternalError = 5,
}

impl ResultCode {
    /// Every result code, in wire order.
    pub const ALL: [ResultCode; 6] = [
        ResultCode::Ok,
        ResultCode::BadRequest,
        ResultCode::Unauthorized,
        ResultCode::ActionNotFound,
        ResultCode::InvalidRequestFormat,
        ResultCode::InternalError,
    ];

    /// Returns the wire byte for this code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire byte, returning `None` for unknown codes.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ResultCode::Ok),
            1 => Some(ResultCode::BadRequest),
            2 => Some(ResultCode::Unauthorized),
            3 => Some(ResultCode::ActionNotFound),
            4 => Some(ResultCode::InvalidRequestFormat),
            5 => Some(ResultCode::InternalError),
            _ => None,
        }
    }

    /// Returns true for [`ResultCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Ok => "Ok",
            ResultCode::BadRequest => "BadRequest",
            ResultCode::Unauthorized => "Unauthorized",
            ResultCode::ActionNotFound => "ActionNotFound",
            ResultCode::InvalidRequestFormat => "InvalidRequestFormat",
            ResultCode::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bytes_are_stable() {
        for (index, code) in ResultCode::ALL.iter().enumerate() {
            assert_eq!(code.as_u8() as usize, index);
            assert_eq!(ResultCode::from_u8(code.as_u8()), Some(*code));
        }
        assert_eq!(ResultCode::from_u8(6), None);
        assert_eq!(ResultCode::from_u8(255), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResultCode::InvalidRequestFormat.to_string(), "InvalidRequestFormat");
        assert!(ResultCode::Ok.is_ok());
        assert!(!ResultCode::InternalError.is_ok());
    }
}
