//! WebSocket message types.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CloseCode, WsError, WsResult};

/// A WebSocket message as seen by the connection engine.
///
/// Data frames (`Text`, `Binary`) carry replier payloads; control frames
/// (`Ping`, `Pong`, `Close`) are handled at the transport level and never
/// reach a replier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
    /// A ping frame.
    Ping(Vec<u8>),
    /// A pong frame.
    Pong(Vec<u8>),
    /// A close frame with optional code and reason.
    Close(Option<CloseFrame>),
}

impl Message {
    /// Creates a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a binary message.
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(data.into())
    }

    /// Creates a close message with a code and reason.
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrame {
            code: code.as_u16(),
            reason: reason.into(),
        }))
    }

    /// Creates a close message with no payload.
    #[must_use]
    pub fn close_empty() -> Self {
        Self::Close(None)
    }

    /// Serializes a value to a JSON text message.
    pub fn from_json<T: Serialize>(value: &T) -> WsResult<Self> {
        let text = serde_json::to_string(value).map_err(|e| WsError::encode(e.to_string()))?;
        Ok(Self::Text(text))
    }

    /// Parses the payload of a data frame as JSON.
    ///
    /// Control frames (and invalid payloads) produce a decode error, which
    /// the read loop treats as transient.
    pub fn json<T: DeserializeOwned>(&self) -> WsResult<T> {
        match self {
            Self::Text(text) => {
                serde_json::from_str(text).map_err(|e| WsError::decode(e.to_string()))
            }
            Self::Binary(data) => {
                serde_json::from_slice(data).map_err(|e| WsError::decode(e.to_string()))
            }
            _ => Err(WsError::decode("not a data frame")),
        }
    }

    /// Returns `true` for a close frame.
    #[must_use]
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }

    /// Returns `true` for a data frame (text or binary).
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Binary(_))
    }

    /// Returns the payload as text for a text frame.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the close frame for a close message.
    #[must_use]
    pub fn close_frame(&self) -> Option<&CloseFrame> {
        match self {
            Self::Close(frame) => frame.as_ref(),
            _ => None,
        }
    }
}

/// A WebSocket close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close code.
    pub code: u16,
    /// The close reason.
    pub reason: String,
}

impl From<tungstenite::Message> for Message {
    fn from(msg: tungstenite::Message) -> Self {
        match msg {
            tungstenite::Message::Text(s) => Self::Text(s.to_string()),
            tungstenite::Message::Binary(b) => Self::Binary(b.to_vec()),
            tungstenite::Message::Ping(b) => Self::Ping(b.to_vec()),
            tungstenite::Message::Pong(b) => Self::Pong(b.to_vec()),
            tungstenite::Message::Close(frame) => Self::Close(frame.map(|f| CloseFrame {
                code: f.code.into(),
                reason: f.reason.to_string(),
            })),
            // Raw frames only appear when frame-level APIs are used.
            tungstenite::Message::Frame(_) => Self::Binary(vec![]),
        }
    }
}

impl From<Message> for tungstenite::Message {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(s) => Self::Text(s.into()),
            Message::Binary(b) => Self::Binary(b.into()),
            Message::Ping(b) => Self::Ping(b.into()),
            Message::Pong(b) => Self::Pong(b.into()),
            Message::Close(frame) => {
                Self::Close(frame.map(|f| tungstenite::protocol::CloseFrame {
                    code: f.code.into(),
                    reason: f.reason.into(),
                }))
            }
        }
    }
}
