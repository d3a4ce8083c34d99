//! The upgraded socket wrapper.
//!
//! A [`Connection`] owns the receive half of one upgraded stream; its
//! [`ConnectionSender`] handles share the send half behind an async mutex.
//! This split matches the engine's resource policy: only the read loop
//! reads, and only the write loop and the close path write.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

use crate::error::{WsError, WsResult};
use crate::message::Message;

/// A unique identifier for one connection, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type SharedSink<S> = Arc<Mutex<SplitSink<WebSocketStream<S>, tungstenite::Message>>>;

/// One upgraded WebSocket connection.
///
/// Ping frames are answered by the protocol layer when the sink flushes;
/// `recv` surfaces them (and pongs) so the read loop can skip them, but a
/// replier never sees a control frame.
pub struct Connection<S> {
    id: ConnectionId,
    sender: SharedSink<S>,
    receiver: SplitStream<WebSocketStream<S>>,
    closed: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an upgraded stream.
    pub fn new(stream: WebSocketStream<S>) -> Self {
        let (sender, receiver) = stream.split();
        Self {
            id: ConnectionId::new(),
            sender: Arc::new(Mutex::new(sender)),
            receiver,
            closed: false,
        }
    }

    /// Returns the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once a close frame has been observed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Receives the next frame.
    ///
    /// `None` means the stream ended without a close handshake (peer
    /// dropped the transport).
    pub async fn recv(&mut self) -> Option<WsResult<Message>> {
        match self.receiver.next().await {
            Some(Ok(raw)) => {
                let message = Message::from(raw);
                if message.is_close() {
                    self.closed = true;
                }
                Some(Ok(message))
            }
            Some(Err(err)) => Some(Err(WsError::from_tungstenite(err))),
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Returns a cloneable handle for the send half.
    #[must_use]
    pub fn sender(&self) -> ConnectionSender<S> {
        ConnectionSender {
            id: self.id,
            sender: Arc::clone(&self.sender),
        }
    }
}

/// A cloneable handle writing to one connection.
pub struct ConnectionSender<S> {
    id: ConnectionId,
    sender: SharedSink<S>,
}

impl<S> Clone for ConnectionSender<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<S> ConnectionSender<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one frame.
    pub async fn send(&self, message: Message) -> WsResult<()> {
        let mut sender = self.sender.lock().await;
        sender
            .send(tungstenite::Message::from(message))
            .await
            .map_err(|e| WsError::send(e.to_string()))
    }

    /// Closes the send half, emitting a close frame if one has not been
    /// sent yet. Closing an already-closed connection is not an error.
    pub async fn close(&self) -> WsResult<()> {
        let mut sender = self.sender.lock().await;
        match sender.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(err) => Err(WsError::from_tungstenite(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tungstenite::protocol::Role;

    async fn pair() -> (
        Connection<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (Connection::new(server), client)
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[tokio::test]
    async fn recv_surfaces_text_frames() {
        let (mut conn, mut client) = pair().await;
        client
            .send(tungstenite::Message::Text("hi".into()))
            .await
            .unwrap();

        let message = conn.recv().await.unwrap().unwrap();
        assert_eq!(message.as_text(), Some("hi"));
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn recv_marks_closed_on_close_frame() {
        let (mut conn, mut client) = pair().await;
        client.send(tungstenite::Message::Close(None)).await.unwrap();

        let message = conn.recv().await.unwrap().unwrap();
        assert!(message.is_close());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn recv_returns_none_on_peer_drop() {
        let (mut conn, client) = pair().await;
        drop(client);

        // Abrupt drop: either a transport-class error or end of stream,
        // never a clean close frame.
        match conn.recv().await {
            None => {}
            Some(Err(err)) => assert!(err.is_fatal_read()),
            Some(Ok(message)) => panic!("unexpected frame: {message:?}"),
        }
    }

    #[tokio::test]
    async fn sender_round_trip_and_idempotent_close() {
        let (conn, mut client) = pair().await;
        let sender = conn.sender();

        sender.send(Message::text("pong")).await.unwrap();
        let received = client.next().await.unwrap().unwrap();
        assert_eq!(received.to_text().unwrap(), "pong");

        sender.close().await.unwrap();
        // Second close must be a no-op, not a doubled error.
        sender.close().await.unwrap();
    }
}
