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

//! Live connections grouped by principal.
//!
//! A server keeps one [`ConnectionRegistry`]. A connection joins its
//! principal's entry when it is authorized and leaves it during teardown, so
//! the registry always reflects who is online and on how many connections.
//! Calls to a user on every device are made by iterating
//! [`connections`](ConnectionRegistry::connections) or with
//! [`fan_out`](ConnectionRegistry::fan_out).
//!
//! An entry whose last connection leaves is marked destroyed and removed. A
//! connection racing to join a destroyed entry retries with a fresh one, so a
//! join is never lost.
//!
//! Lock order is entry, then map. The map lock is never held while taking an
//! entry lock.

use crate::auth::PrincipalId;
use crate::connection::ConnectionId;
use crate::{Connection, RpcError};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::debug;

#[derive(Debug, Default)]
struct Members {
    connections: HashMap<ConnectionId, Connection>,
    destroyed: bool,
}

/// The live connections of one principal.
#[derive(Debug)]
pub struct RegistryEntry {
    principal: PrincipalId,
    members: Mutex<Members>,
}

impl RegistryEntry {
    fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            members: Mutex::new(Members::default()),
        }
    }

    /// The principal this entry belongs to.
    pub fn principal(&self) -> PrincipalId {
        self.principal
    }

    /// Snapshot of the entry's connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.members.lock().connections.values().cloned().collect()
    }

    /// Number of connections.
    pub fn len(&self) -> usize {
        self.members.lock().connections.len()
    }

    /// Returns true if the entry has no connections.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the entry was emptied and removed from its registry.
    pub fn is_destroyed(&self) -> bool {
        self.members.lock().destroyed
    }

    /// Adds a connection unless the entry was destroyed.
    fn try_attach(&self, connection: Connection) -> bool {
        let mut members = self.members.lock();
        if members.destroyed {
            return false;
        }
        members.connections.insert(connection.id(), connection);
        true
    }
}

/// Principal to live connections map.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<PrincipalId, Arc<RegistryEntry>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the principal's entry, creating it if needed.
    pub fn get_or_create(&self, principal: PrincipalId) -> Arc<RegistryEntry> {
        self.entries
            .lock()
            .entry(principal)
            .or_insert_with(|| Arc::new(RegistryEntry::new(principal)))
            .clone()
    }

    /// Returns the principal's entry, if any connection is attached.
    pub fn get(&self, principal: PrincipalId) -> Option<Arc<RegistryEntry>> {
        self.entries.lock().get(&principal).cloned()
    }

    /// Adds a connection to its principal's entry.
    pub fn attach(&self, principal: PrincipalId, connection: Connection) -> Arc<RegistryEntry> {
        loop {
            let entry = self.get_or_create(principal);
            if entry.try_attach(connection.clone()) {
                #[cfg(feature = "observability")]
                debug!(%principal, connection_id = %connection.id(), "attached connection");
                return entry;
            }
            // Destroyed between lookup and attach; a fresh entry replaces it.
        }
    }

    /// Removes a connection from its principal's entry.
    ///
    /// Returns true if the connection was attached.
    pub fn detach(&self, principal: PrincipalId, connection: ConnectionId) -> bool {
        let Some(entry) = self.get(principal) else {
            return false;
        };

        let mut members = entry.members.lock();
        let removed = members.connections.remove(&connection).is_some();
        if removed && members.connections.is_empty() {
            members.destroyed = true;
            let mut entries = self.entries.lock();
            if entries
                .get(&principal)
                .is_some_and(|current| Arc::ptr_eq(current, &entry))
            {
                entries.remove(&principal);
            }
        }

        #[cfg(feature = "observability")]
        {
            if removed {
                debug!(%principal, connection_id = %connection, "detached connection");
            }
        }
        removed
    }

    /// Snapshot of a principal's live connections.
    pub fn connections(&self, principal: PrincipalId) -> Vec<Connection> {
        self.get(principal)
            .map(|entry| entry.connections())
            .unwrap_or_default()
    }

    /// Returns true if the principal has at least one live connection.
    pub fn is_online(&self, principal: PrincipalId) -> bool {
        self.get(principal).is_some_and(|entry| !entry.is_empty())
    }

    /// Principals with at least one live connection.
    pub fn principals(&self) -> Vec<PrincipalId> {
        self.entries.lock().keys().copied().collect()
    }

    /// Number of principals with at least one live connection.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Runs `call` on every connection of `principal` concurrently.
    ///
    /// Returns one result per connection. A failure on one connection does not
    /// affect the others.
    pub async fn fan_out<F, Fut, T>(
        &self,
        principal: PrincipalId,
        call: F,
    ) -> Vec<(ConnectionId, Result<T, RpcError>)>
    where
        F: Fn(Connection) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let calls = self.connections(principal).into_iter().map(|connection| {
            let id = connection.id();
            let call = call(connection);
            async move { (id, call.await) }
        });
        join_all(calls).await
    }
}
