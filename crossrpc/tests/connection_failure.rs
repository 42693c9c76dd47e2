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

//! Integration tests for connection failure handling.
//!
//! These tests verify that:
//! - Every outstanding call fails exactly once when the connection dies
//! - Protocol violations tear the connection down
//! - Malformed requests only fail themselves
//! - Clients dial again after their connection closed

use crossrpc::bridge::{Call, invoke};
use crossrpc::codec::{
    FrameHeader, FramingError, HEADER_SIZE, RequestEnvelope, ResponseEnvelope, ResultCode,
    encode_message,
};
use crossrpc::connection::{ConnectionBuilder, ConnectionState};
use crossrpc::dispatch::{ControllerDescriptor, ControllerRegistry, MethodDescriptor};
use crossrpc::endpoint::{Client, ConnectionConfig, Server};
use crossrpc::transport::{
    Fragment, MemoryTransport, Transport, TransportSink, TransportSource, memory_endpoint,
};
use crossrpc::{Connection, ConnectionError, RpcError, ValueFormat};
use std::time::Duration;
use tokio::time::timeout;

/// Routes engine logs to the test harness; `RUST_LOG=crossrpc=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn home_controllers() -> ControllerRegistry {
    let home = ControllerDescriptor::new("Home")
        .allow_anonymous(true)
        .method(MethodDescriptor::new("Echo", false, |context, mut arguments| {
            Box::pin(async move {
                let text: String = arguments.take("text")?;
                context.encode(&text)
            })
        }))
        .method(MethodDescriptor::new("Hang", false, |context, _| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                context.encode(&())
            })
        }));
    ControllerRegistry::builder()
        .controller(home)
        .build()
        .expect("valid controllers")
}

fn echo(text: &str) -> Call {
    let mut call = Call::new(ValueFormat::Json, "Home/Echo");
    call.argument("text", text).expect("serializable");
    call
}

async fn next_fragment(source: &mut Box<dyn TransportSource>) -> Fragment {
    timeout(Duration::from_secs(5), source.receive())
        .await
        .expect("fragment in time")
        .expect("receive")
}

async fn wait_closed(connection: &Connection) {
    timeout(Duration::from_secs(5), connection.closed())
        .await
        .expect("connection closes in time");
}

/// K outstanding calls fail exactly once with the same cause when the peer vanishes.
#[tokio::test]
async fn test_outstanding_calls_fail_on_disconnect() {
    init_tracing();
    const K: usize = 10;
    let (left, right) = MemoryTransport::pair(64);
    let client = ConnectionBuilder::new().connect(Box::new(left));
    let (sink, mut source) = Box::new(right).split();

    let calls: Vec<_> = (0..K)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { invoke::<String, _>(&client, echo(&i.to_string())).await })
        })
        .collect();
    for _ in 0..K {
        next_fragment(&mut source).await;
    }
    assert_eq!(client.pending_calls(), K);

    drop(sink);
    drop(source);

    for call in calls {
        let err = call.await.unwrap().unwrap_err();
        assert!(
            matches!(err, RpcError::Connection(ConnectionError::RemoteClosed)),
            "unexpected error: {:?}",
            err
        );
    }
    wait_closed(&client).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.metrics().calls_failed, K as u64);
    assert_eq!(client.pending_calls(), 0);
}

/// An invalid header is a protocol violation that ends the connection.
#[tokio::test]
async fn test_invalid_header_tears_down() {
    init_tracing();
    let (left, right) = MemoryTransport::pair(16);
    let client = ConnectionBuilder::new().connect(Box::new(left));
    let (mut sink, mut source) = Box::new(right).split();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { invoke::<String, _>(&client, echo("lost")).await })
    };
    next_fragment(&mut source).await;

    sink.send(&[9, 0, 1, 0, 0, 0, 0], true).await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        RpcError::Connection(ConnectionError::Framing(FramingError::InvalidFlag(9)))
    ));
    wait_closed(&client).await;

    // The transport is closed from the client's side too.
    let end = timeout(Duration::from_secs(5), source.receive())
        .await
        .expect("end of stream in time");
    assert!(end.is_err());
}

/// A message shorter than its declared length is a protocol violation.
#[tokio::test]
async fn test_incomplete_message_tears_down() {
    init_tracing();
    let (left, right) = MemoryTransport::pair(16);
    let server = ConnectionBuilder::new()
        .controllers(home_controllers())
        .accept(Box::new(left));
    let (mut sink, _source) = Box::new(right).split();

    let mut message = FrameHeader::request(1, 10).encode().to_vec();
    message.extend_from_slice(&[1, 2, 3]);
    sink.send(&message, true).await.unwrap();

    wait_closed(&server).await;
    assert!(matches!(
        server.close_reason(),
        Some(ConnectionError::Framing(FramingError::IncompleteMessage { .. }))
    ));
}

/// A declared length above `max_message_size` is rejected before buffering.
#[tokio::test]
async fn test_oversized_message_tears_down() {
    init_tracing();
    let (left, right) = MemoryTransport::pair(16);
    let server = ConnectionBuilder::new()
        .config(ConnectionConfig::default().with_max_message_size(1024))
        .controllers(home_controllers())
        .accept(Box::new(left));
    let (mut sink, _source) = Box::new(right).split();

    sink.send(&FrameHeader::request(1, 10_000).encode(), false)
        .await
        .unwrap();

    wait_closed(&server).await;
    assert!(matches!(
        server.close_reason(),
        Some(ConnectionError::Framing(FramingError::MessageTooLarge { .. }))
    ));
}

/// A malformed request is answered `InvalidRequestFormat`; the connection lives on.
#[tokio::test]
async fn test_malformed_request_keeps_connection() {
    init_tracing();
    let (left, right) = MemoryTransport::pair(16);
    let server = ConnectionBuilder::new()
        .controllers(home_controllers())
        .accept(Box::new(left));
    let (mut sink, mut source) = Box::new(right).split();

    let garbage = encode_message(true, 5, &[0, 0, 0, 99, 1]).unwrap();
    sink.send(&garbage, true).await.unwrap();

    let fragment = next_fragment(&mut source).await;
    let header = FrameHeader::decode(&fragment.data).unwrap();
    assert!(!header.is_request());
    assert_eq!(header.correlation_id(), 5);
    let response = ResponseEnvelope::decode(&fragment.data[HEADER_SIZE..]).unwrap();
    assert_eq!(response.code(), ResultCode::InvalidRequestFormat);

    let mut request = RequestEnvelope::new("Home/Echo");
    request
        .arguments
        .push(crossrpc::codec::Argument::new("text", b"\"ok\"".to_vec()));
    let message = encode_message(true, 6, &request.encode()).unwrap();
    sink.send(&message, true).await.unwrap();

    let fragment = next_fragment(&mut source).await;
    let header = FrameHeader::decode(&fragment.data).unwrap();
    assert_eq!(header.correlation_id(), 6);
    assert_eq!(
        ResponseEnvelope::decode(&fragment.data[HEADER_SIZE..]).unwrap(),
        ResponseEnvelope::success(b"\"ok\"".to_vec())
    );
    assert!(server.is_open());
}

/// A response that does not decode fails only its own call.
#[tokio::test]
async fn test_undecodable_response_fails_one_call() {
    init_tracing();
    let (left, right) = MemoryTransport::pair(16);
    let client = ConnectionBuilder::new().connect(Box::new(left));
    let (mut sink, mut source) = Box::new(right).split();

    let call = {
        let client = client.clone();
        tokio::spawn(async move { invoke::<String, _>(&client, echo("x")).await })
    };
    let fragment = next_fragment(&mut source).await;
    let header = FrameHeader::decode(&fragment.data).unwrap();
    let message = encode_message(false, header.correlation_id(), &[42]).unwrap();
    sink.send(&message, true).await.unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::Deserialization(_)));
    assert!(client.is_open());
}

/// Closing the server fails client calls still in flight.
#[tokio::test]
async fn test_server_close_fails_in_flight_calls() {
    let (left, right) = MemoryTransport::pair(16);
    let client = ConnectionBuilder::new().connect(Box::new(left));
    let server = ConnectionBuilder::new()
        .controllers(home_controllers())
        .accept(Box::new(right));

    let call = {
        let client = client.clone();
        tokio::spawn(async move {
            invoke::<(), _>(&client, Call::new(ValueFormat::Json, "Home/Hang")).await
        })
    };
    while server.metrics().requests_received == 0 {
        tokio::task::yield_now().await;
    }

    server.close().await;
    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_connection_failure());
    wait_closed(&client).await;
    assert!(matches!(
        client.close_reason(),
        Some(ConnectionError::RemoteClosed)
    ));
}

/// The client dials again once its connection is gone.
#[tokio::test]
async fn test_client_reconnects() {
    let (connector, listener) = memory_endpoint(16);
    let server = Server::new(home_controllers(), ConnectionConfig::default());
    let serving = server.clone();
    tokio::spawn(async move { serving.serve(&listener).await });

    let client = Client::new(connector, ConnectionConfig::default());
    let reply: String = invoke(&client, echo("one")).await.unwrap();
    assert_eq!(reply, "one");
    let first = client.current().expect("connected");

    server.shutdown().await;
    wait_closed(&first).await;
    assert!(client.current().is_none());

    let reply: String = invoke(&client, echo("two")).await.unwrap();
    assert_eq!(reply, "two");
    let second = client.current().expect("reconnected");
    assert_ne!(first.id(), second.id());
    assert_eq!(client.state(), ConnectionState::Open);
}

/// A client whose peer is unreachable reports `ConnectFailed`.
#[tokio::test]
async fn test_connect_failure() {
    let (connector, listener) = memory_endpoint(16);
    drop(listener);

    let client = Client::new(connector, ConnectionConfig::default());
    let err = invoke::<String, _>(&client, echo("nobody")).await.unwrap_err();
    assert!(matches!(
        err,
        RpcError::Connection(ConnectionError::ConnectFailed(_))
    ));
    assert_eq!(client.state(), ConnectionState::Closed);
}
