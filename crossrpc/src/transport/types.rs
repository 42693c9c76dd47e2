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

//! Transport identity and metadata.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique transport identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Allocates the next identifier.
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport({})", self.0)
    }
}

/// Metadata describing a transport.
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    /// Unique identifier.
    pub id: TransportId,
    /// Local address, for socket transports.
    pub local_addr: Option<SocketAddr>,
    /// Remote address, for socket transports.
    pub peer_addr: Option<SocketAddr>,
    /// Short kind name such as `"tcp"` or `"memory"`.
    pub transport_type: &'static str,
    /// Creation time.
    pub created_at: Instant,
}

impl TransportMetadata {
    /// Creates metadata for a transport of the given kind with a fresh id.
    pub fn new(transport_type: &'static str) -> Self {
        Self {
            id: TransportId::next(),
            local_addr: None,
            peer_addr: None,
            transport_type,
            created_at: Instant::now(),
        }
    }

    /// Sets the local address.
    #[must_use]
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Time since the transport was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = TransportId::next();
        let b = TransportId::next();
        assert_ne!(a, b);
        assert!(format!("{}", a).starts_with("Transport("));
    }

    #[test]
    fn test_metadata_with_addresses() {
        let local = "127.0.0.1:8080".parse().unwrap();
        let peer = "127.0.0.1:9090".parse().unwrap();
        let metadata = TransportMetadata::new("test")
            .with_local_addr(local)
            .with_peer_addr(peer);
        assert_eq!(metadata.transport_type, "test");
        assert_eq!(metadata.local_addr, Some(local));
        assert_eq!(metadata.peer_addr, Some(peer));
    }
}
