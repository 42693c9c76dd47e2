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

//! WebSocket transport.
//!
//! Each logical message is sent as one WebSocket binary message. When the
//! connection splits a message into several fragments, the first fragment is a
//! non-final binary frame and the rest are continuation frames, so the peer's
//! WebSocket layer reassembles them into a single binary message again.
//!
//! Only binary messages are accepted; a text message is a protocol violation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crossrpc::transport::{WebSocketConfig, WebSocketTransport, WebSocketTransportListener};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = WebSocketTransportListener::bind("127.0.0.1:9000", WebSocketConfig::default()).await?;
//! let client = WebSocketTransport::connect("ws://127.0.0.1:9000", WebSocketConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use super::{
    CloseReason, Connector, Fragment, Transport, TransportError, TransportListener,
    TransportMetadata, TransportSink, TransportSource,
};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as ProtocolConfig;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{CloseCode, Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::{CloseFrame, Frame};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, accept_async_with_config, connect_async_with_config,
};

#[cfg(feature = "observability")]
use tracing::{debug, info};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Largest single WebSocket frame, and the largest fragment the connection
    /// will hand to this transport.
    ///
    /// Default: 1 MiB
    pub max_frame_size: usize,

    /// Largest reassembled WebSocket message.
    ///
    /// Default: 64 MiB
    pub max_message_size: usize,

    /// Disables Nagle's algorithm on client sockets.
    ///
    /// Default: true
    pub nodelay: bool,

    /// How long an accepted socket may take to complete the upgrade
    /// handshake before it is dropped.
    ///
    /// Default: 10 seconds
    pub handshake_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            nodelay: true,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl WebSocketConfig {
    fn protocol_config(&self) -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.max_frame_size = Some(self.max_frame_size);
        config.max_message_size = Some(self.max_message_size);
        config
    }
}

/// A WebSocket connection.
pub struct WebSocketTransport {
    stream: Stream,
    config: WebSocketConfig,
    metadata: TransportMetadata,
}

impl WebSocketTransport {
    /// Opens a client connection to `url` (`ws://` or `wss://`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::WebSocket`] if the handshake fails.
    pub async fn connect(url: &str, config: WebSocketConfig) -> Result<Self, TransportError> {
        #[cfg(feature = "observability")]
        info!(%url, "connecting to WebSocket endpoint");

        let (stream, _response) =
            connect_async_with_config(url, Some(config.protocol_config()), config.nodelay).await?;
        Ok(Self::new(stream, config))
    }

    /// Performs the server side handshake on an accepted TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::WebSocket`] if the handshake fails.
    pub async fn accept(stream: TcpStream, config: WebSocketConfig) -> Result<Self, TransportError> {
        let stream = accept_async_with_config(
            MaybeTlsStream::Plain(stream),
            Some(config.protocol_config()),
        )
        .await?;
        Ok(Self::new(stream, config))
    }

    fn new(stream: Stream, config: WebSocketConfig) -> Self {
        let mut metadata = TransportMetadata::new("websocket");
        if let MaybeTlsStream::Plain(tcp) = stream.get_ref() {
            if let Ok(addr) = tcp.peer_addr() {
                metadata = metadata.with_peer_addr(addr);
            }
            if let Ok(addr) = tcp.local_addr() {
                metadata = metadata.with_local_addr(addr);
            }
        }

        #[cfg(feature = "observability")]
        debug!(transport_id = %metadata.id, "WebSocket transport established");

        Self {
            stream,
            config,
            metadata,
        }
    }

    /// Returns the transport configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportSource>) {
        let max_frame_size = self.config.max_frame_size;
        let (sink, stream) = self.stream.split();
        (
            Box::new(WebSocketSink {
                sink,
                max_frame_size,
                in_message: false,
            }),
            Box::new(WebSocketSource { stream }),
        )
    }
}

struct WebSocketSink {
    sink: SplitSink<Stream, Message>,
    max_frame_size: usize,
    in_message: bool,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, fragment: &[u8], end_of_message: bool) -> Result<(), TransportError> {
        let message = match (self.in_message, end_of_message) {
            (false, true) => Message::Binary(fragment.to_vec()),
            (false, false) => Message::Frame(Frame::message(
                fragment.to_vec(),
                OpCode::Data(Data::Binary),
                false,
            )),
            (true, is_final) => Message::Frame(Frame::message(
                fragment.to_vec(),
                OpCode::Data(Data::Continue),
                is_final,
            )),
        };
        self.in_message = !end_of_message;
        self.sink.send(message).await?;
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let code = match reason {
            CloseReason::Normal => CloseCode::Normal,
            CloseReason::ProtocolError(_) => CloseCode::Protocol,
            CloseReason::Error(_) => CloseCode::Error,
        };
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.description().to_string()),
        };
        self.sink.send(Message::Close(Some(frame))).await?;
        Ok(())
    }

    fn max_fragment_size(&self) -> Option<usize> {
        Some(self.max_frame_size)
    }
}

struct WebSocketSource {
    stream: SplitStream<Stream>,
}

#[async_trait]
impl TransportSource for WebSocketSource {
    async fn receive(&mut self) -> Result<Fragment, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Fragment::last(data)),
                // Pings are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Ok(Message::Text(_))) => {
                    return Err(TransportError::WebSocketProtocol {
                        reason: "received text message, expected binary".to_string(),
                    });
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

/// Accepts WebSocket connections.
///
/// Handshakes run in their own tasks, bounded by
/// [`WebSocketConfig::handshake_timeout`], so a peer that opens a socket and
/// never upgrades it cannot hold up the peers behind it.
/// [`accept`](TransportListener::accept) yields transports in the order their
/// handshakes complete.
pub struct WebSocketTransportListener {
    local_addr: SocketAddr,
    accepted: Mutex<mpsc::Receiver<Result<WebSocketTransport, TransportError>>>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransportListener {
    /// Binds a TCP listener that performs the WebSocket handshake on accept.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address is unavailable.
    pub async fn bind(
        addr: impl Into<String>,
        config: WebSocketConfig,
    ) -> Result<Self, TransportError> {
        let address = addr.into();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| TransportError::BindFailed {
                address: address.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        #[cfg(feature = "observability")]
        info!(%address, %local_addr, "WebSocket listener bound");

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        let acceptor = tokio::spawn(run_acceptor(listener, config, tx));
        Ok(Self {
            local_addr,
            accepted: Mutex::new(rx),
            acceptor,
        })
    }
}

impl Drop for WebSocketTransportListener {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

/// Completed handshakes (and accept failures) waiting for `accept`.
const ACCEPT_BACKLOG: usize = 64;

async fn run_acceptor(
    listener: TcpListener,
    config: WebSocketConfig,
    accepted: mpsc::Sender<Result<WebSocketTransport, TransportError>>,
) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _peer_addr)) => stream,
            Err(e) => {
                // Reported through `accept`; a full backlog slows this loop down.
                if accepted.send(Err(e.into())).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let config = config.clone();
        let accepted = accepted.clone();
        tokio::spawn(async move {
            let deadline = config.handshake_timeout;
            match tokio::time::timeout(deadline, WebSocketTransport::accept(stream, config)).await {
                Ok(Ok(transport)) => {
                    let _ = accepted.send(Ok(transport)).await;
                }
                Ok(Err(_error)) => {
                    #[cfg(feature = "observability")]
                    debug!(error = %_error, "WebSocket handshake failed");
                }
                Err(_) => {
                    #[cfg(feature = "observability")]
                    debug!(?deadline, "WebSocket handshake timed out");
                }
            }
        });
    }
}

#[async_trait]
impl TransportListener for WebSocketTransportListener {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        match self.accepted.lock().await.recv().await {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(error)) => Err(error),
            None => Err(TransportError::Closed),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local_addr)
    }
}

/// Dials a fixed WebSocket URL for a lazily connecting client.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Creates a connector for `url`.
    pub fn new(url: impl Into<String>, config: WebSocketConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(
            WebSocketTransport::connect(&self.url, self.config.clone()).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (Box<dyn Transport>, Box<dyn Transport>) {
        let listener = WebSocketTransportListener::bind("127.0.0.1:0", WebSocketConfig::default())
            .await
            .unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let connector = WebSocketConnector::new(url, WebSocketConfig::default());
        let (client, server) = tokio::join!(connector.connect(), listener.accept());
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn test_single_fragment_message() {
        let (client, server) = connected_pair().await;
        assert_eq!(client.metadata().transport_type, "websocket");
        let (mut client_sink, _client_source) = client.split();
        let (_server_sink, mut server_source) = server.split();

        client_sink.send(b"whole", true).await.unwrap();
        let fragment = server_source.receive().await.unwrap();
        assert_eq!(fragment, Fragment::last(b"whole".to_vec()));
    }

    #[tokio::test]
    async fn test_fragments_are_reassembled() {
        let (client, server) = connected_pair().await;
        let (mut client_sink, _client_source) = client.split();
        let (_server_sink, mut server_source) = server.split();

        client_sink.send(b"one-", false).await.unwrap();
        client_sink.send(b"two-", false).await.unwrap();
        client_sink.send(b"three", true).await.unwrap();
        client_sink.send(b"next", true).await.unwrap();

        assert_eq!(server_source.receive().await.unwrap().data, b"one-two-three");
        assert_eq!(server_source.receive().await.unwrap().data, b"next");
    }

    #[tokio::test]
    async fn test_idle_peer_does_not_block_accept() {
        let listener = WebSocketTransportListener::bind("127.0.0.1:0", WebSocketConfig::default())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        // Connects but never sends the upgrade request.
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let connector = WebSocketConnector::new(format!("ws://{}", addr), WebSocketConfig::default());
        let (client, server) = tokio::time::timeout(
            Duration::from_secs(3),
            async { tokio::join!(connector.connect(), listener.accept()) },
        )
        .await
        .expect("second peer is accepted");
        assert!(client.is_ok());
        assert_eq!(server.unwrap().metadata().transport_type, "websocket");
    }

    #[tokio::test]
    async fn test_handshake_timeout_drops_idle_peer() {
        use tokio::io::AsyncReadExt;

        let config = WebSocketConfig {
            handshake_timeout: Duration::from_millis(50),
            ..WebSocketConfig::default()
        };
        let listener = WebSocketTransportListener::bind("127.0.0.1:0", config)
            .await
            .unwrap();
        let mut idle = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(3), idle.read(&mut buf))
            .await
            .expect("server gives up on the handshake");
        // Either a clean end of stream or a reset.
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_close_reaches_peer() {
        let (client, server) = connected_pair().await;
        let (mut client_sink, _client_source) = client.split();
        let (_server_sink, mut server_source) = server.split();

        client_sink.close(CloseReason::Normal).await.unwrap();
        assert!(matches!(server_source.receive().await, Err(TransportError::Closed)));
    }
}
