//! JSON-lines protocol spoken over stdin/stdout.
//!
//! One request object per input line, one reply object per output line.
//! Status events from the monitor are interleaved on the same output.

use std::sync::Arc;

use application::PrinterBridge;
use domain::{ErrorKind, PrinterError, StatusEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Success { id: Value, ok: Value },
    Failure { id: Value, error: ErrorBody },
    Event { event: &'static str, data: StatusEvent },
}

impl Outgoing {
    pub fn reply(id: Value, result: domain::Result<Value>) -> Self {
        match result {
            Ok(ok) => Self::Success { id, ok },
            Err(e) => Self::failure(id, e),
        }
    }

    pub fn failure(id: Value, error: PrinterError) -> Self {
        Self::Failure {
            id,
            error: ErrorBody {
                code: error.kind(),
                message: error.reason(),
            },
        }
    }

    pub fn status(data: StatusEvent) -> Self {
        Self::Event {
            event: "status",
            data,
        }
    }
}

/// Serve requests from `input` until EOF or `shutdown`, then shut the bridge down.
///
/// Every request runs on its own task; all output goes through a single
/// writer so lines never interleave.
pub async fn serve<R, W>(
    bridge: Arc<PrinterBridge>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer = tokio::spawn(write_lines(output, rx));

    let mut status_rx = bridge.subscribe_status();
    let events = tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = status_rx.recv().await {
            if events.send(Outgoing::status(event)).is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(input).lines();
    let mut in_flight = JoinSet::new();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read request line");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let bridge = bridge.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    debug!(method = %request.method, "Request received");
                    let result = bridge.handle(&request.method, &request.args).await;
                    let _ = tx.send(Outgoing::reply(request.id, result));
                });
            }
            Err(e) => {
                warn!(error = %e, "Malformed request");
                let error = PrinterError::invalid_argument(format!("Malformed request: {}", e));
                let _ = tx.send(Outgoing::failure(Value::Null, error));
            }
        }
    }

    // Every accepted request still gets its reply
    while in_flight.join_next().await.is_some() {}

    bridge.shutdown().await;
    let _ = forwarder.await;
    drop(tx);
    writer.await??;
    Ok(())
}

async fn write_lines<W>(mut output: W, mut rx: mpsc::UnboundedReceiver<Outgoing>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Dropping unencodable message");
                continue;
            }
        };
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}
