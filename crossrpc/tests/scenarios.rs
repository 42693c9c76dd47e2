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

//! End-to-end scenarios.
//!
//! These tests walk through the two canonical interactions:
//! - A client authorizing through `Auth/Authorize` and using the session
//! - A server-initiated call overlapping a slow client call on one connection

use crossrpc::codec::{FrameHeader, HEADER_SIZE, RequestEnvelope, ResponseEnvelope, ResultCode, encode_message};
use crossrpc::connection::ConnectionBuilder;
use crossrpc::dispatch::ControllerRegistry;
use crossrpc::endpoint::{Client, ConnectionConfig, Server};
use crossrpc::transport::{MemoryTransport, Transport, TransportSink, TransportSource, memory_endpoint};
use crossrpc::{
    AuthToken, PrincipalId, RemoteError, RequestContext, RpcError, TokenClaims, TokenCodec,
    controller,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Stores claims as JSON. Good enough for tests; never for production.
struct PlainCodec;

impl TokenCodec for PlainCodec {
    fn seal(&self, claims: &TokenClaims) -> Result<AuthToken, RpcError> {
        serde_json::to_vec(claims)
            .map(AuthToken::new)
            .map_err(RpcError::internal)
    }

    fn open(&self, token: &AuthToken) -> Option<TokenClaims> {
        serde_json::from_slice(token.as_bytes()).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    pub principal_id: i64,
    pub token: AuthToken,
}

#[controller(name = "Auth", allow_anonymous)]
pub trait AuthController {
    async fn authorize(&self, login: String, password: String) -> Result<AuthResult, RpcError>;

    async fn resume(&self, token: AuthToken) -> Result<bool, RpcError>;
}

#[controller(name = "Profile")]
pub trait ProfileController {
    async fn whoami(&self) -> Result<i64, RpcError>;
}

struct AuthService {
    context: RequestContext,
}

#[crossrpc::async_trait]
impl AuthController for AuthService {
    async fn authorize(&self, login: String, password: String) -> Result<AuthResult, RpcError> {
        let principal_id = match (login.as_str(), password.as_str()) {
            ("u1", "p1") => 1,
            ("u2", "p2") => 2,
            _ => return Err(RemoteError::bad_request("invalid login or password").into()),
        };
        let token = self.context.authorize(PrincipalId::new(principal_id))?;
        Ok(AuthResult {
            principal_id,
            token,
        })
    }

    async fn resume(&self, token: AuthToken) -> Result<bool, RpcError> {
        self.context.authorize_with_token(&token)
    }
}

struct ProfileService {
    context: RequestContext,
}

#[crossrpc::async_trait]
impl ProfileController for ProfileService {
    async fn whoami(&self) -> Result<i64, RpcError> {
        self.context
            .principal()
            .map(|principal| principal.as_i64())
            .ok_or_else(|| RpcError::internal_message("authorized call without a principal"))
    }
}

fn auth_server() -> Server {
    let controllers = ControllerRegistry::builder()
        .controller(AuthControllerDispatcher::descriptor(|context: &RequestContext| {
            AuthService {
                context: context.clone(),
            }
        }))
        .controller(ProfileControllerDispatcher::descriptor(|context: &RequestContext| {
            ProfileService {
                context: context.clone(),
            }
        }))
        .build()
        .expect("valid controllers");
    Server::new(controllers, ConnectionConfig::default()).with_token_codec(Arc::new(PlainCodec))
}

fn start(server: &Server) -> Client {
    let (connector, listener) = memory_endpoint(32);
    let server = server.clone();
    tokio::spawn(async move { server.serve(&listener).await });
    Client::new(connector, ConnectionConfig::default())
}

/// A client signs in as `u1` and receives principal 1 plus a usable session.
#[tokio::test]
async fn test_authorize_scenario() {
    let server = auth_server();
    let client = start(&server);
    let auth = AuthControllerProxy::new(client.clone());
    let profile = ProfileControllerProxy::new(client.clone());

    let err = profile.whoami().await.unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::Unauthorized));

    let result = auth
        .authorize("u1".to_string(), "p1".to_string())
        .await
        .expect("authorize succeeds");
    assert_eq!(result.principal_id, 1);
    assert!(!result.token.as_bytes().is_empty());

    assert_eq!(profile.whoami().await.unwrap(), 1);
    assert!(server.sessions().is_online(PrincipalId::new(1)));
}

/// A wrong password is a `BadRequest` and leaves the connection anonymous.
#[tokio::test]
async fn test_authorize_rejects_bad_password() {
    let server = auth_server();
    let client = start(&server);
    let auth = AuthControllerProxy::new(client.clone());

    let err = auth
        .authorize("u1".to_string(), "wrong".to_string())
        .await
        .unwrap_err();
    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.code(), ResultCode::BadRequest);
    assert_eq!(remote.message(), "invalid login or password");
    assert!(server.sessions().is_empty());
}

/// Authorizing twice fails and keeps the first principal.
#[tokio::test]
async fn test_reauthorization_is_rejected() {
    let server = auth_server();
    let client = start(&server);
    let auth = AuthControllerProxy::new(client.clone());
    let profile = ProfileControllerProxy::new(client.clone());

    auth.authorize("u1".to_string(), "p1".to_string())
        .await
        .unwrap();
    let err = auth
        .authorize("u2".to_string(), "p2".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::BadRequest));
    assert_eq!(profile.whoami().await.unwrap(), 1);
    assert!(!server.sessions().is_online(PrincipalId::new(2)));
}

/// A token issued on one connection authorizes a later one.
#[tokio::test]
async fn test_token_resumes_session_on_new_connection() {
    let server = auth_server();
    let client = start(&server);
    let auth = AuthControllerProxy::new(client.clone());

    let token = auth
        .authorize("u2".to_string(), "p2".to_string())
        .await
        .unwrap()
        .token;
    client.close().await;

    // The next call dials a fresh, anonymous connection.
    let profile = ProfileControllerProxy::new(client.clone());
    let err = profile.whoami().await.unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::Unauthorized));

    assert!(auth.resume(token).await.unwrap());
    assert_eq!(profile.whoami().await.unwrap(), 2);

    // Already authorized: even a genuine token is refused now.
    let err = auth.resume(AuthToken::new(b"forged".to_vec())).await.unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::BadRequest));
}

/// A forged token does not authorize and does not close the connection.
#[tokio::test]
async fn test_forged_token_is_ignored() {
    let server = auth_server();
    let client = start(&server);
    let auth = AuthControllerProxy::new(client.clone());

    assert!(!auth.resume(AuthToken::new(b"forged".to_vec())).await.unwrap());
    assert!(client.current().is_some());
    let accepted = server.connections();
    assert_eq!(accepted.len(), 1);
    assert!(!accepted[0].is_authorized());
    assert!(server.sessions().is_empty());
}

#[controller(name = "Home", allow_anonymous)]
pub trait SlowController {
    async fn slow(&self, label: String) -> Result<String, RpcError>;
}

#[controller(name = "Client", allow_anonymous)]
pub trait ClientController {
    async fn ping(&self, seq: u32) -> Result<u32, RpcError>;
}

struct SlowService {
    release: Arc<Notify>,
}

#[crossrpc::async_trait]
impl SlowController for SlowService {
    async fn slow(&self, label: String) -> Result<String, RpcError> {
        self.release.notified().await;
        Ok(format!("{} done", label))
    }
}

async fn send(sink: &mut Box<dyn TransportSink>, is_request: bool, id: i16, payload: &[u8]) {
    let message = encode_message(is_request, id, payload).unwrap();
    sink.send(&message, true).await.expect("send");
}

async fn receive(source: &mut Box<dyn TransportSource>) -> (FrameHeader, Vec<u8>) {
    let fragment = timeout(Duration::from_secs(5), source.receive())
        .await
        .expect("message in time")
        .expect("receive");
    assert!(fragment.end_of_message);
    let header = FrameHeader::decode(&fragment.data).unwrap();
    (header, fragment.data[HEADER_SIZE..].to_vec())
}

/// While the client's call 42 is still running on the server, the server calls
/// the client with id 7. Both complete independently.
#[tokio::test]
async fn test_server_initiated_call_overlaps_slow_call() {
    let release = Arc::new(Notify::new());
    let slow_release = release.clone();
    let controllers = ControllerRegistry::builder()
        .controller(SlowControllerDispatcher::descriptor(move |_: &RequestContext| {
            SlowService {
                release: slow_release.clone(),
            }
        }))
        .build()
        .unwrap();

    let (raw, right) = MemoryTransport::pair(32);
    let server = ConnectionBuilder::new()
        .controllers(controllers)
        .accept(Box::new(right));
    let (mut sink, mut source) = Box::new(raw).split();
    let client = ClientControllerProxy::new(server.clone());

    let ping = |seq: u32| {
        let client = client.clone();
        tokio::spawn(async move { client.ping(seq).await })
    };
    let answer = |seq: u32| ResponseEnvelope::success(serde_json::to_vec(&seq).unwrap()).encode();

    // Six earlier server calls move the server's next correlation id to 7.
    for seq in 1..=6u32 {
        let call = ping(seq);
        let (header, _) = receive(&mut source).await;
        assert!(header.is_request());
        send(&mut sink, false, header.correlation_id(), &answer(seq)).await;
        assert_eq!(call.await.unwrap().unwrap(), seq);
    }

    // Client call 42 parks inside the slow handler.
    let mut slow = RequestEnvelope::new("Home/slow");
    slow.arguments.push(crossrpc::codec::Argument::new("label", b"\"report\"".to_vec()));
    send(&mut sink, true, 42, &slow.encode()).await;

    // Server-initiated call 7.
    let server_call = ping(70);
    let (header, payload) = receive(&mut source).await;
    assert!(header.is_request());
    assert_eq!(header.correlation_id(), 7);
    let request = RequestEnvelope::decode(&payload).unwrap();
    assert_eq!(request.action, "Client/ping");
    send(&mut sink, false, 7, &answer(70)).await;
    assert_eq!(server_call.await.unwrap().unwrap(), 70);

    // Only now does call 42 finish.
    release.notify_one();
    let (header, payload) = receive(&mut source).await;
    assert!(!header.is_request());
    assert_eq!(header.correlation_id(), 42);
    let response = ResponseEnvelope::decode(&payload).unwrap();
    assert_eq!(
        response,
        ResponseEnvelope::success(b"\"report done\"".to_vec())
    );
    assert!(server.is_open());
}
