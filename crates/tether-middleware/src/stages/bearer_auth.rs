//! Static bearer-token authentication middleware.

use std::sync::Arc;

use thiserror::Error;

use crate::chain::{middleware, pre_handle, WsMiddleware};

/// The request carried no acceptable `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unauthorized: missing or invalid bearer token")]
pub struct Unauthorized;

/// Rejects requests whose `Authorization` header is not `Bearer <token>`.
///
/// Comparison is exact; rejected requests short-circuit the chain and never
/// reach the upgrade step.
#[must_use]
pub fn bearer_auth(token: impl Into<String>) -> WsMiddleware {
    let expected: Arc<str> = format!("Bearer {}", token.into()).into();
    middleware(move |next| {
        let expected = Arc::clone(&expected);
        pre_handle(move |ctx, head| {
            let expected = Arc::clone(&expected);
            let next = Arc::clone(&next);
            async move {
                match head.header("authorization") {
                    Some(value) if value == expected.as_ref() => next(ctx, head).await,
                    _ => Err(Box::new(Unauthorized) as tether_core::BoxError),
                }
            }
        })
    })
}
