//! A minimal echo endpoint.
//!
//! Every message received on `/echo` is queued and framed straight back to
//! the peer through the write loop.
//!
//! ```text
//! cargo run --example echo
//! # then, from another terminal:
//! # websocat ws://127.0.0.1:8080/echo
//! # {"text":"hello"}
//! # {"code":200,"msg":"ok","data":{"text":"hello"}}
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, Mutex};

use tether::prelude::*;
use tether::ConnectionHandler;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct EchoMessage {
    text: String,
}

impl Validate for EchoMessage {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.text.is_empty() {
            return Err(ValidationError::new("text must not be empty"));
        }
        Ok(())
    }
}

/// Queues every applied message and replies with it verbatim.
struct EchoReplier {
    tx: mpsc::Sender<EchoMessage>,
    rx: Mutex<mpsc::Receiver<EchoMessage>>,
}

impl EchoReplier {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Replier for EchoReplier {
    type Request = EchoMessage;
    type Response = EchoMessage;

    async fn apply(&self, _ctx: &RequestContext, req: EchoMessage) -> Result<(), ReplierError> {
        self.tx
            .send(req)
            .await
            .map_err(|_| ReplierError::internal("echo queue closed"))
    }

    async fn reply(&self, _ctx: &RequestContext) -> Result<EchoMessage, ReplierError> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(ReplierError::Cancelled)
    }

    async fn close(&self, _ctx: &RequestContext) -> Result<(), ReplierError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::development()).context("failed to initialize logging")?;

    let options = ServerOptions::new().handler_builder(FnHandlerBuilder::new("/echo", |_ctx| {
        let options = WsOptions::default().with_middleware(tether::stages::logging());
        Ok(Arc::new(Endpoint::new(EchoReplier::new(), options)) as Arc<dyn ConnectionHandler>)
    }));

    let config = ServerConfig::builder().addr("127.0.0.1:8080").build();
    let server = Server::bind(config, options)
        .await
        .context("failed to bind echo server")?;

    tracing::info!(addr = %server.local_addr()?, "echo server ready");
    server.run().await.context("server failed")?;
    Ok(())
}
