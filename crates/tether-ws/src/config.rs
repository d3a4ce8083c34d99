//! Connection configuration.
//!
//! Upgrade-time settings (buffer sizes, message limits, origin checking)
//! live in an explicit immutable value injected at endpoint construction
//! rather than in process-global state.

/// Origin-check policy applied during the upgrade handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept any `Origin` header, including none. The default, matching
    /// browser-less and same-process clients.
    #[default]
    AllowAny,
    /// Accept only requests whose `Origin` header exactly matches one of
    /// the listed values.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Whether a request with the given `Origin` header may upgrade.
    #[must_use]
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match self {
            Self::AllowAny => true,
            Self::AllowList(allowed) => {
                origin.is_some_and(|o| allowed.iter().any(|a| a == o))
            }
        }
    }
}

/// Immutable per-connection configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Write buffer size in bytes (default: 1 KiB).
    write_buffer_size: usize,
    /// Maximum message size in bytes (default: 16 MiB).
    max_message_size: usize,
    /// Maximum frame size in bytes (default: 4 MiB).
    max_frame_size: usize,
    /// Whether to accept unmasked frames from clients (default: false).
    accept_unmasked_frames: bool,
    /// Origin-check policy (default: allow any).
    origin: OriginPolicy,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: 1024,
            max_message_size: 16 * 1024 * 1024,
            max_frame_size: 4 * 1024 * 1024,
            accept_unmasked_frames: false,
            origin: OriginPolicy::AllowAny,
        }
    }
}

impl WsConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write buffer size.
    #[must_use]
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets whether unmasked client frames are accepted.
    #[must_use]
    pub fn accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Sets the origin-check policy.
    #[must_use]
    pub fn origin(mut self, origin: OriginPolicy) -> Self {
        self.origin = origin;
        self
    }

    /// Returns the origin-check policy.
    #[must_use]
    pub fn origin_policy(&self) -> &OriginPolicy {
        &self.origin
    }

    /// Maps this configuration onto the protocol implementation's settings.
    #[must_use]
    pub fn to_protocol(&self) -> tungstenite::protocol::WebSocketConfig {
        let mut config = tungstenite::protocol::WebSocketConfig::default();
        config.write_buffer_size = self.write_buffer_size;
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_frame_size);
        config.accept_unmasked_frames = self.accept_unmasked_frames;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WsConfig::default();
        assert_eq!(config.write_buffer_size, 1024);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert!(!config.accept_unmasked_frames);
        assert_eq!(*config.origin_policy(), OriginPolicy::AllowAny);
    }

    #[test]
    fn builder_overrides() {
        let config = WsConfig::new()
            .write_buffer_size(4096)
            .max_message_size(1024)
            .max_frame_size(512)
            .accept_unmasked_frames(true);
        let protocol = config.to_protocol();
        assert_eq!(protocol.write_buffer_size, 4096);
        assert_eq!(protocol.max_message_size, Some(1024));
        assert_eq!(protocol.max_frame_size, Some(512));
        assert!(protocol.accept_unmasked_frames);
    }

    #[test]
    fn allow_any_accepts_missing_origin() {
        assert!(OriginPolicy::AllowAny.allows(None));
        assert!(OriginPolicy::AllowAny.allows(Some("https://example.com")));
    }

    #[test]
    fn allow_list_is_exact() {
        let policy = OriginPolicy::AllowList(vec!["https://app.example.com".into()]);
        assert!(policy.allows(Some("https://app.example.com")));
        assert!(!policy.allows(Some("https://evil.example.com")));
        assert!(!policy.allows(None));
    }
}
