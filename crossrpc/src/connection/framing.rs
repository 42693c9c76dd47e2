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

//! Message reassembly and fragmentation.
//!
//! A message may span several transport fragments. The reader accumulates
//! fragments until the header is complete, then sizes its buffer from the
//! header's content length. A fragment marked end-of-message before the
//! message is complete, or bytes past the declared length, are protocol
//! violations.

use crate::codec::{FrameHeader, FramingError, HEADER_SIZE};
use crate::metrics::ConnectionMetrics;
use crate::transport::{TransportError, TransportSink, TransportSource};
use crate::ConnectionError;

#[cfg(feature = "observability")]
use tracing::trace;

/// A complete message as read off the transport.
#[derive(Debug)]
pub(crate) struct InboundMessage {
    pub(crate) header: FrameHeader,
    bytes: Vec<u8>,
}

impl InboundMessage {
    pub(crate) fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }
}

/// Reads one complete message.
///
/// Transport failures and protocol violations are both fatal to the
/// connection, so both come back as a [`ConnectionError`].
pub(crate) async fn read_message(
    source: &mut dyn TransportSource,
    max_message_size: usize,
    metrics: &ConnectionMetrics,
) -> Result<InboundMessage, ConnectionError> {
    let first = source.receive().await?;
    metrics.record_fragment_received(first.data.len());
    let mut buffer = first.data;
    let mut ended = first.end_of_message;

    while buffer.len() < HEADER_SIZE {
        if ended {
            return Err(FramingError::Truncated {
                expected: HEADER_SIZE,
                actual: buffer.len(),
            }
            .into());
        }
        ended = receive_into(source, &mut buffer, metrics).await?;
    }

    let header = FrameHeader::decode(&buffer)?;
    // decode rejects negative lengths
    let content_length = header.content_length() as usize;
    if content_length > max_message_size {
        return Err(FramingError::MessageTooLarge {
            size: content_length,
            max: max_message_size,
        }
        .into());
    }

    let total = header.message_len();
    if buffer.len() < total {
        buffer.reserve_exact(total - buffer.len());
    }
    while buffer.len() < total {
        if ended {
            return Err(FramingError::IncompleteMessage {
                expected: total,
                actual: buffer.len(),
            }
            .into());
        }
        ended = receive_into(source, &mut buffer, metrics).await?;
    }
    if buffer.len() > total {
        return Err(FramingError::TrailingBytes {
            expected: total,
            actual: buffer.len(),
        }
        .into());
    }

    #[cfg(feature = "observability")]
    trace!(
        correlation_id = header.correlation_id(),
        is_request = header.is_request(),
        content_length,
        "message reassembled"
    );

    Ok(InboundMessage {
        header,
        bytes: buffer,
    })
}

async fn receive_into(
    source: &mut dyn TransportSource,
    buffer: &mut Vec<u8>,
    metrics: &ConnectionMetrics,
) -> Result<bool, TransportError> {
    let fragment = source.receive().await?;
    metrics.record_fragment_received(fragment.data.len());
    buffer.extend_from_slice(&fragment.data);
    Ok(fragment.end_of_message)
}

/// Writes one message as back-to-back fragments of at most `fragment_size` bytes.
pub(crate) async fn write_message(
    sink: &mut dyn TransportSink,
    message: &[u8],
    fragment_size: usize,
    metrics: &ConnectionMetrics,
) -> Result<(), TransportError> {
    let mut chunks = message.chunks(fragment_size.max(1)).peekable();
    while let Some(chunk) = chunks.next() {
        let last = chunks.peek().is_none();
        sink.send(chunk, last).await?;
        metrics.record_fragment_sent(chunk.len());
    }
    Ok(())
}

/// Effective fragment size for a sink.
pub(crate) fn fragment_size(configured: usize, sink: &dyn TransportSink) -> usize {
    match sink.max_fragment_size() {
        Some(limit) => configured.min(limit),
        None => configured,
    }
    .max(1)
}
