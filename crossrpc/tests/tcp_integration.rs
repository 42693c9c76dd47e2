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

//! Integration tests for connections over TCP.
//!
//! These tests verify:
//! - Proxy calls through a served TCP listener
//! - Messages larger than a fragment crossing the length-prefixed framing
//! - Server shutdown reaching the client

use crossrpc::endpoint::{Client, ConnectionConfig, Server};
use crossrpc::transport::{TcpConnector, TcpTransportListener, TransportListener};
use crossrpc::dispatch::ControllerRegistry;
use crossrpc::{ConnectionState, RequestContext, RpcError, controller};
use std::time::Duration;
use tokio::time::timeout;

#[controller(name = "Storage", allow_anonymous)]
pub trait StorageController {
    async fn echo(&self, data: Vec<u8>) -> Result<Vec<u8>, RpcError>;

    async fn fill(&self, byte: u8, len: usize) -> Result<Vec<u8>, RpcError>;
}

struct Storage;

#[crossrpc::async_trait]
impl StorageController for Storage {
    async fn echo(&self, data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        Ok(data)
    }

    async fn fill(&self, byte: u8, len: usize) -> Result<Vec<u8>, RpcError> {
        Ok(vec![byte; len])
    }
}

async fn serve(config: ConnectionConfig) -> (Server, String) {
    let listener = TcpTransportListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_addr().expect("local address").to_string();
    let controllers = ControllerRegistry::builder()
        .controller(StorageControllerDispatcher::descriptor(|_: &RequestContext| Storage))
        .build()
        .expect("valid controllers");
    let server = Server::new(controllers, config);
    let serving = server.clone();
    tokio::spawn(async move { serving.serve(&listener).await });
    (server, address)
}

/// A simple call over TCP.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_round_trip() {
    let (_server, address) = serve(ConnectionConfig::default()).await;
    let client = Client::new(TcpConnector::new(address), ConnectionConfig::default());
    let storage = StorageControllerProxy::new(client.clone());

    let reply = storage.echo(b"ping".to_vec()).await.expect("echo");
    assert_eq!(reply, b"ping");

    let connection = client.current().expect("connected");
    assert_eq!(connection.metadata().transport_type, "tcp");
    assert!(connection.metadata().peer_addr.is_some());
}

/// Messages spanning many fragments arrive intact in both directions.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_fragmented_messages() {
    let config = ConnectionConfig::default().with_max_fragment_size(1024);
    let (_server, address) = serve(config.clone()).await;
    let client = Client::new(TcpConnector::new(address), config);
    let storage = StorageControllerProxy::new(client.clone());

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let reply = storage.echo(payload.clone()).await.expect("echo");
    assert_eq!(reply, payload);

    let filled = storage.fill(7, 100_000).await.expect("fill");
    assert_eq!(filled.len(), 100_000);
    assert!(filled.iter().all(|b| *b == 7));

    let metrics = client.current().expect("connected").metrics();
    assert!(metrics.fragments_sent > 100);
    assert!(metrics.fragments_received > 100);
}

/// Concurrent calls share one TCP connection.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tcp_concurrent_calls() {
    let (server, address) = serve(ConnectionConfig::default()).await;
    let client = Client::new(TcpConnector::new(address), ConnectionConfig::default());

    let calls: Vec<_> = (0..32u8)
        .map(|i| {
            let storage = StorageControllerProxy::new(client.clone());
            tokio::spawn(async move { (i, storage.fill(i, i as usize * 10).await) })
        })
        .collect();
    for call in calls {
        let (i, result) = call.await.unwrap();
        assert_eq!(result.unwrap(), vec![i; i as usize * 10]);
    }
    assert_eq!(server.connection_count(), 1);
}

/// Shutting the server down closes the client's connection.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_server_shutdown() {
    let (server, address) = serve(ConnectionConfig::default()).await;
    let client = Client::new(TcpConnector::new(address), ConnectionConfig::default());
    StorageControllerProxy::new(client.clone())
        .echo(Vec::new())
        .await
        .expect("echo");
    let connection = client.current().expect("connected");

    server.shutdown().await;
    timeout(Duration::from_secs(5), connection.closed())
        .await
        .expect("client notices shutdown");
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(connection.close_reason().is_some());
}

/// Dialing a port nobody listens on fails the call.
#[tokio::test]
async fn test_tcp_connect_refused() {
    let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = Client::new(TcpConnector::new(address), ConnectionConfig::default());
    let err = StorageControllerProxy::new(client.clone())
        .echo(Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_connection_failure());
}
