//! Error types for the connection engine.
//!
//! The variants follow the framework's propagation policy: pre-upgrade
//! errors go through the HTTP error encoder; post-upgrade errors are either
//! transient (decode noise, logged and skipped) or fatal to the one
//! connection (transport-level, never surfaced as an error payload).

use std::fmt;

use thiserror::Error;

/// Result type for WebSocket operations.
pub type WsResult<T> = Result<T, WsError>;

/// Errors produced by the connection engine and socket wrapper.
#[derive(Debug, Error)]
pub enum WsError {
    /// The request could not be upgraded (bad handshake headers,
    /// disallowed origin). Pre-upgrade; surfaced via the error encoder.
    #[error("upgrade rejected: {reason}")]
    Upgrade {
        /// Why the handshake was rejected.
        reason: String,
    },

    /// The peer closed the connection. Fatal to the connection, silent.
    #[error("connection closed")]
    Closed,

    /// Transport-level failure (peer reset, protocol violation).
    /// Fatal to the connection, silent.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message payload could not be decoded. Transient: the read loop
    /// logs and continues.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A payload could not be encoded. Transient.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A frame could not be written to the socket.
    #[error("failed to send message: {0}")]
    Send(String),

    /// I/O failure on the underlying stream. Fatal to the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WsError {
    /// Creates an upgrade rejection.
    pub fn upgrade(reason: impl Into<String>) -> Self {
        Self::Upgrade {
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    /// Creates an encode error.
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode(reason.into())
    }

    /// Creates a send error.
    pub fn send(reason: impl Into<String>) -> Self {
        Self::Send(reason.into())
    }

    /// Whether a read-side occurrence of this error ends the connection.
    ///
    /// Peer reset and close-class conditions terminate the read loop after
    /// exactly one occurrence; everything else is decode noise the loop
    /// skips.
    #[must_use]
    pub fn is_fatal_read(&self) -> bool {
        matches!(self, Self::Closed | Self::Transport(_) | Self::Io(_))
    }

    /// Classifies a tungstenite error per the read-loop policy.
    #[must_use]
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            tungstenite::Error::Io(e) => Self::Io(e),
            tungstenite::Error::Protocol(p) => Self::Transport(p.to_string()),
            tungstenite::Error::Capacity(c) => Self::Decode(c.to_string()),
            tungstenite::Error::WriteBufferFull(_) => Self::Send("write buffer full".into()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Standard WebSocket close codes used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal = 1000,
    /// Going away (1001).
    GoingAway = 1001,
    /// Protocol error (1002).
    Protocol = 1002,
    /// Invalid payload data (1007).
    InvalidPayload = 1007,
    /// Policy violation (1008).
    PolicyViolation = 1008,
    /// Internal error (1011).
    InternalError = 1011,
}

impl CloseCode {
    /// Returns the numeric close code.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Parses a numeric close code, if it is one the engine knows.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::Protocol),
            1007 => Some(Self::InvalidPayload),
            1008 => Some(Self::PolicyViolation),
            1011 => Some(Self::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::GoingAway => "GoingAway",
            Self::Protocol => "Protocol",
            Self::InvalidPayload => "InvalidPayload",
            Self::PolicyViolation => "PolicyViolation",
            Self::InternalError => "InternalError",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_errors_are_not_read_fatal() {
        assert!(!WsError::upgrade("missing header").is_fatal_read());
    }

    #[test]
    fn transport_class_is_read_fatal() {
        assert!(WsError::Closed.is_fatal_read());
        assert!(WsError::transport("reset by peer").is_fatal_read());
        assert!(WsError::Io(std::io::Error::other("broken pipe")).is_fatal_read());
    }

    #[test]
    fn decode_noise_is_transient() {
        assert!(!WsError::decode("bad json").is_fatal_read());
        assert!(!WsError::encode("bad value").is_fatal_read());
        assert!(!WsError::send("sink gone").is_fatal_read());
    }

    #[test]
    fn tungstenite_classification() {
        let closed = WsError::from_tungstenite(tungstenite::Error::ConnectionClosed);
        assert!(closed.is_fatal_read());

        let reset = WsError::from_tungstenite(tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )));
        assert!(reset.is_fatal_read());
    }

    #[test]
    fn close_code_round_trip() {
        assert_eq!(CloseCode::Normal.as_u16(), 1000);
        assert_eq!(CloseCode::from_u16(1000), Some(CloseCode::Normal));
        assert_eq!(CloseCode::from_u16(4242), None);
    }

    #[test]
    fn close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "Normal (1000)");
        assert_eq!(CloseCode::InvalidPayload.to_string(), "InvalidPayload (1007)");
    }
}
