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

//! Per-request context.

use crate::auth::{AuthToken, PrincipalId};
use crate::codec::{Serializer, ValueFormat};
use crate::{Connection, RpcError};
use serde::Serialize;
use std::sync::Arc;

/// What a controller sees of the request it serves.
///
/// Created for each inbound request and handed to the controller factory, so a
/// controller instance can keep it for the duration of the call. Through
/// [`connection`](Self::connection) a controller can authorize the connection
/// or call back into the peer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    connection: Connection,
    correlation_id: i16,
    action: Arc<str>,
}

impl RequestContext {
    pub(crate) fn new(connection: Connection, correlation_id: i16, action: String) -> Self {
        Self {
            connection,
            correlation_id,
            action: action.into(),
        }
    }

    /// The connection the request arrived on.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The request's correlation id.
    pub fn correlation_id(&self) -> i16 {
        self.correlation_id
    }

    /// The action as sent by the caller.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The connection's value format.
    pub fn format(&self) -> ValueFormat {
        self.connection.format()
    }

    /// The principal the connection is authorized as.
    pub fn principal(&self) -> Option<PrincipalId> {
        self.connection.principal()
    }

    /// Returns true if the connection is authorized.
    pub fn is_authorized(&self) -> bool {
        self.connection.is_authorized()
    }

    /// Authorizes the connection. See [`Connection::authorize`].
    ///
    /// # Errors
    ///
    /// As [`Connection::authorize`].
    pub fn authorize(&self, principal: PrincipalId) -> Result<AuthToken, RpcError> {
        self.connection.authorize(principal)
    }

    /// Authorizes the connection with a token. See [`Connection::authorize_with_token`].
    ///
    /// # Errors
    ///
    /// As [`Connection::authorize_with_token`].
    pub fn authorize_with_token(&self, token: &AuthToken) -> Result<bool, RpcError> {
        self.connection.authorize_with_token(token)
    }

    /// Serializes a method result in the connection's format.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, RpcError> {
        Ok(self.format().serialize(value)?)
    }
}
