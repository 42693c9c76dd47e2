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

//! Authorization primitives.
//!
//! A connection is bound to at most one [`PrincipalId`]. Binding happens either
//! directly, through [`Connection::authorize`](crate::Connection::authorize),
//! which also issues a bearer [`AuthToken`], or by presenting a token issued
//! earlier to [`Connection::authorize_with_token`](crate::Connection::authorize_with_token).
//!
//! The token format belongs to the application: the connection only needs a
//! [`TokenCodec`] that can seal and open [`TokenClaims`].

use crate::RpcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Identity of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(i64);

impl PrincipalId {
    /// Creates a principal id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.0)
    }
}

/// An opaque bearer token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(Vec<u8>);

impl AuthToken {
    /// Wraps raw token bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the token, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log token material.
        write!(f, "AuthToken({} bytes)", self.0.len())
    }
}

/// What a token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal the token was issued to.
    pub principal: PrincipalId,
    /// Instant after which the token is no longer accepted.
    pub expires_at: SystemTime,
}

impl TokenClaims {
    /// Returns true if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Seals and opens bearer tokens.
///
/// Implementations typically encrypt or sign the claims. The connection checks
/// expiry itself, so `open` only has to verify integrity.
pub trait TokenCodec: Send + Sync + 'static {
    /// Produces a token carrying `claims`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be produced; the caller of
    /// `authorize` sees it as an internal error.
    fn seal(&self, claims: &TokenClaims) -> Result<AuthToken, RpcError>;

    /// Recovers the claims from a token, or `None` if it is not genuine.
    fn open(&self, token: &AuthToken) -> Option<TokenClaims>;
}
