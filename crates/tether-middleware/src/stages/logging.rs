//! Request logging middleware.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chain::{middleware, pre_handle, WsMiddleware};

/// Logs every pre-upgrade decision.
///
/// Entry is logged at debug, rejections at warn with the error text.
/// Register it last so it observes the whole chain.
#[must_use]
pub fn logging() -> WsMiddleware {
    middleware(|next| {
        pre_handle(move |ctx, head| {
            let next = Arc::clone(&next);
            async move {
                debug!(
                    request_id = %ctx.request_id(),
                    path = %head.path(),
                    "pre-upgrade chain entered"
                );
                let result = next(ctx.clone(), head).await;
                if let Err(err) = &result {
                    warn!(
                        request_id = %ctx.request_id(),
                        error = %err,
                        "pre-upgrade chain rejected request"
                    );
                }
                result
            }
        })
    })
}
