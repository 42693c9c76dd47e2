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

//! Calls awaiting a response.
//!
//! Every outgoing request is registered here under a fresh correlation id
//! before it is queued. The receive loop completes entries as responses
//! arrive; teardown drains whatever is left with the connection's close cause.
//!
//! Entries are resolved exactly once. Whoever removes an entry from the table
//! owns its completion slot, so a late or duplicate response finds nothing and
//! is ignored.

use crate::{ConnectionError, RpcError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::oneshot;

/// Number of distinct correlation ids.
const ID_SPACE: usize = 1 << 16;

/// What a pending call resolves to: the raw result payload or the reason it failed.
pub type CallResult = Result<Vec<u8>, RpcError>;

/// One outstanding call.
#[derive(Debug)]
pub struct PendingCall {
    action: String,
    expected_type: &'static str,
    registered_at: Instant,
    ticket: u64,
    slot: oneshot::Sender<CallResult>,
}

impl PendingCall {
    /// Action the call was made to.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Name of the type the caller expects back.
    pub fn expected_type(&self) -> &'static str {
        self.expected_type
    }

    /// When the call was registered.
    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Resolves the call. Returns false if the caller stopped waiting.
    fn resolve(self, result: CallResult) -> bool {
        self.slot.send(result).is_ok()
    }
}

/// A successful registration.
#[derive(Debug)]
pub struct Registration {
    /// Id to put in the request header.
    pub correlation_id: i16,
    /// Resolves when the response arrives or the connection dies.
    pub receiver: oneshot::Receiver<CallResult>,
    ticket: u64,
}

impl Registration {
    /// Identifies this registration among all that ever used the same id.
    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }
}

#[derive(Debug)]
struct State {
    calls: HashMap<i16, PendingCall>,
    next_id: i16,
    next_ticket: u64,
    drained: Option<ConnectionError>,
}

/// Correlation table for one connection.
#[derive(Debug)]
pub struct PendingCalls {
    state: Mutex<State>,
    limit: usize,
}

impl PendingCalls {
    /// Creates an empty table. `limit` caps the number of outstanding calls;
    /// `None` allows every id in the 16-bit space.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                calls: HashMap::new(),
                next_id: 1,
                next_ticket: 0,
                drained: None,
            }),
            limit: limit.map_or(ID_SPACE, |limit| limit.clamp(1, ID_SPACE)),
        }
    }

    /// Registers a new call under the next unused id.
    ///
    /// Ids are handed out sequentially and wrap around, skipping ids that are
    /// still in use.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Connection`] with the drain cause once the table was drained
    /// - [`RpcError::TooManyPendingCalls`] when the limit is reached
    pub fn register(
        &self,
        action: &str,
        expected_type: &'static str,
    ) -> Result<Registration, RpcError> {
        let mut state = self.state.lock();
        if let Some(cause) = &state.drained {
            return Err(RpcError::Connection(cause.clone()));
        }
        if state.calls.len() >= self.limit {
            return Err(RpcError::TooManyPendingCalls { limit: self.limit });
        }

        // Terminates: fewer than ID_SPACE ids are in use.
        let correlation_id = loop {
            let candidate = state.next_id;
            state.next_id = candidate.wrapping_add(1);
            if !state.calls.contains_key(&candidate) {
                break candidate;
            }
        };
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let (slot, receiver) = oneshot::channel();
        state.calls.insert(
            correlation_id,
            PendingCall {
                action: action.to_string(),
                expected_type,
                registered_at: Instant::now(),
                ticket,
                slot,
            },
        );

        Ok(Registration {
            correlation_id,
            receiver,
            ticket,
        })
    }

    /// Resolves a call with a result payload.
    ///
    /// Returns false if no call with that id is pending.
    pub fn complete(&self, correlation_id: i16, payload: Vec<u8>) -> bool {
        self.resolve(correlation_id, Ok(payload))
    }

    /// Resolves a call with an error.
    ///
    /// Returns false if no call with that id is pending.
    pub fn fail(&self, correlation_id: i16, error: RpcError) -> bool {
        self.resolve(correlation_id, Err(error))
    }

    /// Resolves a call with either outcome.
    pub fn resolve(&self, correlation_id: i16, result: CallResult) -> bool {
        match self.try_remove(correlation_id) {
            Some(call) => {
                // A caller that gave up still counts as matched.
                call.resolve(result);
                true
            }
            None => false,
        }
    }

    /// Removes a call without resolving it. Idempotent.
    pub fn try_remove(&self, correlation_id: i16) -> Option<PendingCall> {
        self.state.lock().calls.remove(&correlation_id)
    }

    /// Removes the call only if it still belongs to the given registration.
    fn abandon(&self, correlation_id: i16, ticket: u64) {
        let mut state = self.state.lock();
        if state
            .calls
            .get(&correlation_id)
            .is_some_and(|call| call.ticket == ticket)
        {
            state.calls.remove(&correlation_id);
        }
    }

    /// Fails every pending call with `cause` and refuses new registrations.
    ///
    /// Returns the number of calls failed. Only the first drain records its
    /// cause; later drains find the table empty.
    pub fn drain_all(&self, cause: ConnectionError) -> usize {
        let calls = {
            let mut state = self.state.lock();
            if state.drained.is_none() {
                state.drained = Some(cause.clone());
            }
            std::mem::take(&mut state.calls)
        };

        let count = calls.len();
        for (_, call) in calls {
            call.resolve(Err(RpcError::Connection(cause.clone())));
        }
        count
    }

    /// Returns true once [`drain_all`](Self::drain_all) ran.
    pub fn is_drained(&self) -> bool {
        self.state.lock().drained.is_some()
    }

    /// Number of calls in flight.
    pub fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Returns true if no call is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Removes an abandoned call from the table when dropped.
///
/// Callers hold one across the wait for a response. If the wait ends through a
/// timeout or because the future was dropped, the entry goes away with the
/// guard. A registration that was already resolved is left alone, even if its
/// id has since been reused.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingCalls,
    correlation_id: i16,
    ticket: u64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingCalls, registration: &Registration) -> Self {
        Self {
            table,
            correlation_id: registration.correlation_id,
            ticket: registration.ticket(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.abandon(self.correlation_id, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_complete() {
        let pending = PendingCalls::default();
        let registration = pending.register("Home/Index", "String").unwrap();
        assert_eq!(pending.len(), 1);

        assert!(pending.complete(registration.correlation_id, b"ok".to_vec()));
        assert_eq!(registration.receiver.await.unwrap().unwrap(), b"ok");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_response_ignored() {
        let pending = PendingCalls::default();
        let registration = pending.register("Home/Index", "()").unwrap();
        let id = registration.correlation_id;

        assert!(pending.complete(id, vec![1]));
        assert!(!pending.complete(id, vec![2]));
        assert!(!pending.fail(id, RpcError::bad_request("late")));
        assert_eq!(registration.receiver.await.unwrap().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let pending = PendingCalls::default();
        assert!(!pending.complete(99, Vec::new()));
        assert!(pending.try_remove(99).is_none());
    }

    #[tokio::test]
    async fn test_ids_are_distinct_while_pending() {
        let pending = PendingCalls::default();
        let first = pending.register("A", "()").unwrap();
        let second = pending.register("B", "()").unwrap();
        assert_ne!(first.correlation_id, second.correlation_id);

        let call = pending.try_remove(first.correlation_id).unwrap();
        assert_eq!(call.action(), "A");
        assert_eq!(call.expected_type(), "()");
    }

    #[tokio::test]
    async fn test_ids_wrap_and_skip_in_use() {
        let pending = PendingCalls::default();
        let held = pending.register("held", "()").unwrap();
        assert_eq!(held.correlation_id, 1);

        // Cycle through the whole id space once.
        for _ in 0..(ID_SPACE - 1) {
            let registration = pending.register("cycle", "()").unwrap();
            assert_ne!(registration.correlation_id, held.correlation_id);
            pending.try_remove(registration.correlation_id);
        }

        let next = pending.register("next", "()").unwrap();
        assert_ne!(next.correlation_id, held.correlation_id);
    }

    #[tokio::test]
    async fn test_limit() {
        let pending = PendingCalls::new(Some(2));
        let _a = pending.register("A", "()").unwrap();
        let b = pending.register("B", "()").unwrap();
        let err = pending.register("C", "()").unwrap_err();
        assert!(matches!(err, RpcError::TooManyPendingCalls { limit: 2 }));

        pending.try_remove(b.correlation_id);
        assert!(pending.register("C", "()").is_ok());
    }

    #[tokio::test]
    async fn test_drain_fails_everything_once() {
        let pending = PendingCalls::default();
        let receivers: Vec<_> = (0..5)
            .map(|_| pending.register("Slow", "()").unwrap().receiver)
            .collect();

        assert_eq!(pending.drain_all(ConnectionError::RemoteClosed), 5);
        assert_eq!(pending.drain_all(ConnectionError::Closed), 0);

        for receiver in receivers {
            let err = receiver.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                RpcError::Connection(ConnectionError::RemoteClosed)
            ));
        }
    }

    #[tokio::test]
    async fn test_register_after_drain() {
        let pending = PendingCalls::default();
        pending.drain_all(ConnectionError::Closed);
        assert!(pending.is_drained());

        let err = pending.register("Home/Index", "()").unwrap_err();
        assert!(matches!(err, RpcError::Connection(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_guard_removes_abandoned_call() {
        let pending = PendingCalls::default();
        let registration = pending.register("Home/Index", "()").unwrap();
        {
            let _guard = PendingGuard::new(&pending, &registration);
        }
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_guard_after_completion_keeps_new_calls() {
        let pending = PendingCalls::new(Some(1));
        let first = pending.register("first", "()").unwrap();
        let guard = PendingGuard::new(&pending, &first);

        pending.complete(first.correlation_id, Vec::new());
        let second = pending.register("second", "()").unwrap();
        drop(guard);

        assert_eq!(pending.len(), 1);
        let call = pending.try_remove(second.correlation_id).unwrap();
        assert_eq!(call.action(), "second");
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let pending = Arc::new(PendingCalls::default());
        let mut handles = vec![];

        for i in 0..100u8 {
            let pending = pending.clone();
            handles.push(tokio::spawn(async move {
                let registration = pending.register("Echo", "u8").unwrap();
                pending.complete(registration.correlation_id, vec![i]);
                registration.receiver.await.unwrap().unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), vec![i as u8]);
        }
        assert!(pending.is_empty());
    }
}
