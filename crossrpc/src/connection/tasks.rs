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

//! The per-connection send and receive loops.

use super::framing::{InboundMessage, fragment_size, read_message, write_message};
use super::{Connection, ConnectionState, Shared, terminating};
use crate::codec::{FrameHeader, RequestEnvelope, ResponseEnvelope, ResultCode};
use crate::dispatch::RequestContext;
use crate::error::RemoteError;
use crate::transport::{CloseReason, TransportSink, TransportSource};
use crate::{ConnectionError, RpcError};
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;

#[cfg(feature = "observability")]
use tracing::{debug, trace, warn};

/// Reads messages until the connection tears down.
///
/// Inbound requests run as tasks in a [`JoinSet`] owned by this loop, so
/// they are aborted when it exits.
pub(super) async fn receive_loop(shared: Arc<Shared>, mut source: Box<dyn TransportSource>) {
    let mut state = shared.subscribe();
    let mut handlers = JoinSet::new();
    let limiter = shared
        .environment
        .config
        .max_concurrent_requests
        .map(|limit| Arc::new(Semaphore::new(limit)));
    let max_message_size = shared.environment.config.max_message_size;

    let failure = loop {
        let message = tokio::select! {
            biased;
            _ = terminating(&mut state) => break None,
            message = read_message(&mut *source, max_message_size, &shared.metrics) => message,
        };

        // Reap finished handlers so the set does not grow.
        while handlers.try_join_next().is_some() {}

        match message {
            Ok(message) if message.header.is_request() => {
                if let Some(request) = decode_request(&shared, &message) {
                    let limiter = limiter.clone();
                    let task_shared = shared.clone();
                    let correlation_id = message.header.correlation_id();
                    handlers.spawn(async move {
                        let permit = acquire(limiter).await;
                        serve_request(task_shared, correlation_id, request, permit).await;
                    });
                }
            }
            Ok(message) => complete_call(&shared, &message),
            Err(cause) => break Some(cause),
        }
    };

    if let Some(cause) = failure {
        shared.teardown(cause);
    }
    handlers.shutdown().await;
}

async fn acquire(limiter: Option<Arc<Semaphore>>) -> Option<OwnedSemaphorePermit> {
    match limiter {
        // The semaphore is never closed.
        Some(limiter) => limiter.acquire_owned().await.ok(),
        None => None,
    }
}

/// Decodes a request, answering `InvalidRequestFormat` if it is malformed.
fn decode_request(shared: &Shared, message: &InboundMessage) -> Option<RequestEnvelope> {
    shared.metrics.record_request_received();
    let correlation_id = message.header.correlation_id();
    match RequestEnvelope::decode(message.payload()) {
        Ok(request) => Some(request),
        Err(error) => {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %shared.id,
                correlation_id,
                %error,
                "malformed request"
            );
            shared.respond(
                correlation_id,
                RemoteError::invalid_request_format(error.to_string()).into(),
            );
            None
        }
    }
}

async fn serve_request(
    shared: Arc<Shared>,
    correlation_id: i16,
    request: RequestEnvelope,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let started = Instant::now();
    let connection = Connection {
        shared: shared.clone(),
    };
    let context = RequestContext::new(connection, correlation_id, request.action.clone());

    #[cfg(feature = "observability")]
    debug!(
        connection_id = %shared.id,
        correlation_id,
        action = %request.action,
        "dispatching request"
    );

    let response = shared.dispatcher.dispatch(context, request).await;

    #[cfg(feature = "observability")]
    trace!(
        connection_id = %shared.id,
        correlation_id,
        code = %response.code(),
        elapsed = ?started.elapsed(),
        "request handled"
    );
    #[cfg(not(feature = "observability"))]
    let _ = started;

    shared.respond(correlation_id, response);
}

/// Routes a response to the call waiting for it.
fn complete_call(shared: &Shared, message: &InboundMessage) {
    shared.metrics.record_response_received();
    let correlation_id = message.header.correlation_id();
    let result = match ResponseEnvelope::decode(message.payload()) {
        Ok(ResponseEnvelope::Success(payload)) => Ok(payload),
        Ok(ResponseEnvelope::Failure { code, message }) => {
            debug_assert_ne!(code, ResultCode::Ok);
            Err(RpcError::Remote(RemoteError::new(code, message)))
        }
        Err(error) => Err(RpcError::Deserialization(error)),
    };

    if !shared.pending.resolve(correlation_id, result) {
        shared.metrics.record_response_dropped();
        #[cfg(feature = "observability")]
        warn!(
            connection_id = %shared.id,
            correlation_id,
            "response matches no pending call"
        );
    }
}

/// Writes queued messages until the connection tears down, then closes the
/// transport.
///
/// A message that has started going out is always finished (or abandoned
/// together with the transport), so the peer never sees fragments of two
/// messages interleaved.
pub(super) async fn send_loop(
    shared: Arc<Shared>,
    mut sink: Box<dyn TransportSink>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut state = shared.subscribe();
    let fragment_size = fragment_size(shared.environment.config.max_fragment_size, &*sink);
    let close_timeout = shared.environment.config.close_timeout;
    let mut interrupted = false;

    loop {
        let message = tokio::select! {
            biased;
            _ = terminating(&mut state) => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let mut write = pin!(write_message(&mut *sink, &message, fragment_size, &shared.metrics));
        let written = tokio::select! {
            written = &mut write => written,
            _ = terminating(&mut state) => {
                // Teardown started mid-message: finish it, within the close deadline.
                match tokio::time::timeout(close_timeout, write).await {
                    Ok(written) => written,
                    Err(_) => {
                        interrupted = true;
                        break;
                    }
                }
            }
        };
        if let Err(error) = written {
            shared.teardown(error.into());
            interrupted = true;
            break;
        }
    }

    let cause = shared.cause.get().cloned().unwrap_or(ConnectionError::Closed);
    let closing = async {
        // A local close flushes the responses queued before it. Queued
        // requests are dropped: their callers were already failed.
        if matches!(cause, ConnectionError::Closed) && !interrupted {
            while let Ok(message) = outbound.try_recv() {
                if is_request(&message) {
                    continue;
                }
                if write_message(&mut *sink, &message, fragment_size, &shared.metrics)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
        sink.close(close_reason(&cause)).await
    };
    match tokio::time::timeout(close_timeout, closing).await {
        Ok(Ok(())) => {}
        Ok(Err(_error)) => {
            #[cfg(feature = "observability")]
            debug!(connection_id = %shared.id, error = %_error, "transport close failed");
        }
        Err(_) => {
            #[cfg(feature = "observability")]
            debug!(connection_id = %shared.id, ?close_timeout, "transport close timed out");
        }
    }

    shared.state.send_replace(ConnectionState::Closed);
    #[cfg(feature = "observability")]
    debug!(connection_id = %shared.id, "connection closed");
}

fn is_request(message: &[u8]) -> bool {
    FrameHeader::decode(message).is_ok_and(|header| header.is_request())
}

fn close_reason(cause: &ConnectionError) -> CloseReason {
    match cause {
        ConnectionError::Closed | ConnectionError::RemoteClosed => CloseReason::Normal,
        ConnectionError::Framing(error) => CloseReason::ProtocolError(error.to_string()),
        other => CloseReason::Error(other.to_string()),
    }
}
