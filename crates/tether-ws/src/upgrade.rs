//! RFC 6455 upgrade handshake.
//!
//! Validation runs against the [`RequestHead`] so it can sit at the
//! innermost position of the pre-upgrade middleware chain; the actual
//! protocol switch happens through hyper's upgrade machinery in the
//! endpoint.

use base64::Engine;
use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::Full;
use sha1::{Digest, Sha1};

use tether_core::{HttpResponse, RequestHead};

use crate::config::OriginPolicy;
use crate::error::{WsError, WsResult};

/// The WebSocket magic GUID used in the handshake.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Checks whether a request head looks like a WebSocket upgrade request.
#[must_use]
pub fn is_websocket_request(head: &RequestHead) -> bool {
    has_upgrade_connection(head)
        && has_websocket_upgrade(head)
        && websocket_key(head).is_some()
        && has_supported_version(head)
}

fn has_upgrade_connection(head: &RequestHead) -> bool {
    head.header(header::CONNECTION.as_str())
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false)
}

fn has_websocket_upgrade(head: &RequestHead) -> bool {
    head.header(header::UPGRADE.as_str())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

fn websocket_key(head: &RequestHead) -> Option<&str> {
    head.header("sec-websocket-key").filter(|v| !v.is_empty())
}

fn has_supported_version(head: &RequestHead) -> bool {
    head.header("sec-websocket-version") == Some("13")
}

/// Computes the `Sec-WebSocket-Accept` value for a client key.
fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Validates an upgrade request against RFC 6455 and the origin policy.
///
/// Returns the accept key for the `101` response. Failures are
/// [`WsError::Upgrade`]: pre-upgrade, surfaced through the HTTP error
/// encoder, never through the socket.
pub fn validate_upgrade(head: &RequestHead, origin: &OriginPolicy) -> WsResult<String> {
    if head.method() != http::Method::GET {
        return Err(WsError::upgrade("upgrade requests must use GET"));
    }

    if !has_upgrade_connection(head) {
        return Err(WsError::upgrade("missing Connection: Upgrade header"));
    }

    if !has_websocket_upgrade(head) {
        return Err(WsError::upgrade("missing Upgrade: websocket header"));
    }

    let key = head
        .header("sec-websocket-key")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WsError::upgrade("missing Sec-WebSocket-Key header"))?;

    if !has_supported_version(head) {
        return Err(WsError::upgrade(
            "missing or unsupported Sec-WebSocket-Version (must be 13)",
        ));
    }

    if !origin.allows(head.header(header::ORIGIN.as_str())) {
        return Err(WsError::upgrade("origin not allowed"));
    }

    Ok(compute_accept_key(key))
}

/// Builds the `101 Switching Protocols` response for an accept key.
#[must_use]
pub fn upgrade_response(accept_key: &str) -> HttpResponse {
    http::Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "Upgrade")
        .header(header::UPGRADE, "websocket")
        .header("Sec-WebSocket-Accept", accept_key)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws_head(mutate: impl FnOnce(http::request::Builder) -> http::request::Builder) -> RequestHead {
        let builder = http::Request::builder()
            .method(http::Method::GET)
            .uri("/ws")
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "websocket")
            .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("Sec-WebSocket-Version", "13");
        RequestHead::of(&mutate(builder).body(()).unwrap())
    }

    #[test]
    fn accepts_valid_request() {
        let head = ws_head(|b| b);
        assert!(is_websocket_request(&head));
        // RFC 6455 section 1.3 example vector.
        let key = validate_upgrade(&head, &OriginPolicy::AllowAny).unwrap();
        assert_eq!(key, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn rejects_non_get() {
        let head = ws_head(|b| b.method(http::Method::POST));
        let err = validate_upgrade(&head, &OriginPolicy::AllowAny).unwrap_err();
        assert!(err.to_string().contains("GET"));
    }

    #[test]
    fn rejects_missing_connection_header() {
        let head = RequestHead::of(
            &http::Request::builder()
                .method(http::Method::GET)
                .uri("/ws")
                .header(header::UPGRADE, "websocket")
                .header("Sec-WebSocket-Key", "key")
                .header("Sec-WebSocket-Version", "13")
                .body(())
                .unwrap(),
        );
        assert!(!is_websocket_request(&head));
        let err = validate_upgrade(&head, &OriginPolicy::AllowAny).unwrap_err();
        assert!(err.to_string().contains("Connection"));
    }

    #[test]
    fn rejects_wrong_version() {
        let head = RequestHead::of(
            &http::Request::builder()
                .method(http::Method::GET)
                .uri("/ws")
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "websocket")
                .header("Sec-WebSocket-Key", "key")
                .header("Sec-WebSocket-Version", "12")
                .body(())
                .unwrap(),
        );
        let err = validate_upgrade(&head, &OriginPolicy::AllowAny).unwrap_err();
        assert!(err.to_string().contains("Sec-WebSocket-Version"));
    }

    #[test]
    fn rejects_disallowed_origin() {
        let head = ws_head(|b| b.header(header::ORIGIN, "https://evil.example.com"));
        let policy = OriginPolicy::AllowList(vec!["https://app.example.com".into()]);
        let err = validate_upgrade(&head, &policy).unwrap_err();
        assert!(err.to_string().contains("origin"));
    }

    #[test]
    fn accepts_allowed_origin() {
        let head = ws_head(|b| b.header(header::ORIGIN, "https://app.example.com"));
        let policy = OriginPolicy::AllowList(vec!["https://app.example.com".into()]);
        assert!(validate_upgrade(&head, &policy).is_ok());
    }

    #[test]
    fn upgrade_response_shape() {
        let response = upgrade_response("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(
            response.headers().get(header::UPGRADE).unwrap(),
            "websocket"
        );
        assert_eq!(
            response.headers().get("Sec-WebSocket-Accept").unwrap(),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }
}
