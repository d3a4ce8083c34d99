//! The pluggable encoding policy.
//!
//! Five stateless functions describe how this endpoint frames data: two for
//! the pre-upgrade HTTP path (success and error), one for decoding inbound
//! HTTP bodies (pre-upgrade path only; the upgrade GET itself carries
//! none), and two for the socket reply path. All default to the JSON
//! envelope `{"code":200,"msg":"ok","data":<payload>}` /
//! `{"code":500,"msg":<error>}`.

use std::sync::Arc;

use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::Full;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use tether_core::{BoxError, HttpResponse};

use crate::message::Message;

/// Encodes a successful HTTP response body.
pub type ResponseEncodeFn<T> = Arc<dyn Fn(&T) -> HttpResponse + Send + Sync>;

/// Encodes a pre-upgrade failure to the HTTP caller.
pub type ErrorEncodeFn = Arc<dyn Fn(&BoxError) -> HttpResponse + Send + Sync>;

/// Decodes an inbound HTTP body (pre-upgrade path only).
pub type RequestDecodeFn<R> = Arc<dyn Fn(&[u8]) -> Result<R, BoxError> + Send + Sync>;

/// Frames a successful reply onto the socket.
pub type ReplyEncodeFn<T> = Arc<dyn Fn(&T) -> Message + Send + Sync>;

/// Frames a failure onto the socket.
pub type ReplyErrorEncodeFn = Arc<dyn Fn(&dyn std::error::Error) -> Message + Send + Sync>;

/// The encoding policy of one endpoint. Pure configuration, no state.
pub struct Encoding<T, R> {
    pub(crate) response_encode: ResponseEncodeFn<T>,
    pub(crate) error_encode: ErrorEncodeFn,
    pub(crate) request_decode: RequestDecodeFn<R>,
    pub(crate) reply_encode: ReplyEncodeFn<T>,
    pub(crate) reply_error_encode: ReplyErrorEncodeFn,
}

impl<T, R> Clone for Encoding<T, R> {
    fn clone(&self) -> Self {
        Self {
            response_encode: Arc::clone(&self.response_encode),
            error_encode: Arc::clone(&self.error_encode),
            request_decode: Arc::clone(&self.request_decode),
            reply_encode: Arc::clone(&self.reply_encode),
            reply_error_encode: Arc::clone(&self.reply_error_encode),
        }
    }
}

impl<T, R> Default for Encoding<T, R>
where
    T: Serialize + 'static,
    R: DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self {
            response_encode: Arc::new(|resp| json_response(StatusCode::OK, &envelope_ok(resp))),
            error_encode: Arc::new(|err| {
                json_response(StatusCode::INTERNAL_SERVER_ERROR, &envelope_err(err.as_ref()))
            }),
            request_decode: Arc::new(|body| {
                serde_json::from_slice(body).map_err(|e| Box::new(e) as BoxError)
            }),
            reply_encode: Arc::new(|resp| Message::Text(envelope_ok(resp).to_string())),
            reply_error_encode: Arc::new(|err| Message::Text(envelope_err(err).to_string())),
        }
    }
}

impl<T, R> Encoding<T, R> {
    /// Encodes a successful HTTP response.
    #[must_use]
    pub fn encode_response(&self, response: &T) -> HttpResponse {
        (self.response_encode)(response)
    }

    /// Encodes a pre-upgrade failure to the HTTP caller.
    #[must_use]
    pub fn encode_error(&self, err: &BoxError) -> HttpResponse {
        (self.error_encode)(err)
    }

    /// Decodes an inbound HTTP body.
    pub fn decode_request(&self, body: &[u8]) -> Result<R, BoxError> {
        (self.request_decode)(body)
    }

    /// Frames a successful reply for the socket.
    #[must_use]
    pub fn encode_reply(&self, response: &T) -> Message {
        (self.reply_encode)(response)
    }

    /// Frames a failure for the socket.
    #[must_use]
    pub fn encode_reply_error(&self, err: &dyn std::error::Error) -> Message {
        (self.reply_error_encode)(err)
    }
}

/// The default success envelope.
fn envelope_ok<T: Serialize>(data: &T) -> serde_json::Value {
    match serde_json::to_value(data) {
        Ok(value) => json!({ "code": 200, "msg": "ok", "data": value }),
        Err(err) => json!({ "code": 500, "msg": format!("encode failed: {err}") }),
    }
}

/// The default failure envelope.
fn envelope_err(err: &dyn std::error::Error) -> serde_json::Value {
    json!({ "code": 500, "msg": err.to_string() })
}

/// Builds a JSON HTTP response.
pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Payload {
        v: u32,
    }

    async fn body_json(response: HttpResponse) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn default_response_envelope() {
        let encoding = Encoding::<Payload, Payload>::default();
        let response = encoding.encode_response(&Payload { v: 1 });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "code": 200, "msg": "ok", "data": { "v": 1 } })
        );
    }

    #[tokio::test]
    async fn default_error_envelope() {
        let encoding = Encoding::<Payload, Payload>::default();
        let err: BoxError = "handler build failed: redis unavailable".to_string().into();
        let response = encoding.encode_error(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "code": 500, "msg": "handler build failed: redis unavailable" })
        );
    }

    #[test]
    fn default_reply_envelope() {
        let encoding = Encoding::<Payload, Payload>::default();
        let message = encoding.encode_reply(&Payload { v: 1 });
        let value: serde_json::Value =
            serde_json::from_str(message.as_text().unwrap()).unwrap();
        assert_eq!(value, json!({ "code": 200, "msg": "ok", "data": { "v": 1 } }));
    }

    #[test]
    fn default_reply_error_envelope() {
        let encoding = Encoding::<Payload, Payload>::default();
        let err = tether_core::ValidationError::new("seq must be positive");
        let message = encoding.encode_reply_error(&err);
        let value: serde_json::Value =
            serde_json::from_str(message.as_text().unwrap()).unwrap();
        assert_eq!(value["code"], 500);
        assert!(value["msg"].as_str().unwrap().contains("seq must be positive"));
    }

    #[test]
    fn default_request_decode_parses_json_bodies() {
        let encoding = Encoding::<Payload, Payload>::default();
        let parsed = encoding.decode_request(br#"{"v":3}"#).unwrap();
        assert_eq!(parsed, Payload { v: 3 });
        assert!(encoding.decode_request(b"not json").is_err());
    }
}
