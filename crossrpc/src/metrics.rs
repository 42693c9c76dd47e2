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

//! Per-connection counters.
//!
//! Counters are plain atomics so they are always available through
//! [`Connection::metrics`](crate::Connection::metrics). With the
//! `observability` feature every increment is also reported to the `metrics`
//! facade under the `crossrpc.` prefix.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one connection.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    requests_sent: AtomicU64,
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    responses_received: AtomicU64,
    responses_dropped: AtomicU64,
    calls_failed: AtomicU64,
    fragments_sent: AtomicU64,
    fragments_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl ConnectionMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.requests.sent").increment(1);
    }

    pub(crate) fn record_request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.requests.received").increment(1);
    }

    pub(crate) fn record_response_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.responses.sent").increment(1);
    }

    pub(crate) fn record_response_received(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.responses.received").increment(1);
    }

    pub(crate) fn record_response_dropped(&self) {
        self.responses_dropped.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.responses.dropped").increment(1);
    }

    pub(crate) fn record_calls_failed(&self, count: u64) {
        self.calls_failed.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.calls.failed").increment(count);
    }

    pub(crate) fn record_fragment_sent(&self, bytes: usize) {
        self.fragments_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.bytes.sent").increment(bytes as u64);
    }

    pub(crate) fn record_fragment_received(&self, bytes: usize) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        ::metrics::counter!("crossrpc.bytes.received").increment(bytes as u64);
    }

    /// Takes a consistent-enough copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ConnectionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests this side sent.
    pub requests_sent: u64,
    /// Requests this side received.
    pub requests_received: u64,
    /// Responses this side sent.
    pub responses_sent: u64,
    /// Responses this side received.
    pub responses_received: u64,
    /// Responses that matched no pending call.
    pub responses_dropped: u64,
    /// Outgoing calls that ended with an error of any kind.
    pub calls_failed: u64,
    /// Transport fragments written.
    pub fragments_sent: u64,
    /// Transport fragments read.
    pub fragments_received: u64,
    /// Bytes written.
    pub bytes_sent: u64,
    /// Bytes read.
    pub bytes_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ConnectionMetrics::new();
        metrics.record_request_sent();
        metrics.record_fragment_sent(10);
        metrics.record_fragment_sent(5);
        metrics.record_calls_failed(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_sent, 1);
        assert_eq!(snapshot.fragments_sent, 2);
        assert_eq!(snapshot.bytes_sent, 15);
        assert_eq!(snapshot.calls_failed, 3);
        assert_eq!(snapshot.responses_received, 0);
    }
}
