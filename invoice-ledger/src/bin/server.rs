//! Ledger server binary
//!
//! Reads one JSON request per line from stdin and writes one JSON response per
//! line to stdout. Logs go to stderr. A line that is not valid UTF-8 gets an
//! `invalid_call` response and the stream continues.
//!
//! ```text
//! {"caller":"bob","call":{"op":"pay_invoice","amount":50}}
//! {"success":true,"reply":"done"}
//! ```

use anyhow::Context;
use invoice_ledger::{Call, Config, Error, Identity, LedgerHandle, LedgerService, Reply};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
struct Request {
    caller: String,
    call: Call,
}

#[derive(Debug, Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl Response {
    fn ok(reply: Reply) -> Self {
        Self {
            success: true,
            reply: Some(reply),
            error: None,
            kind: None,
        }
    }

    fn err(error: &Error) -> Self {
        Self {
            success: false,
            reply: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }
}

async fn handle_line(handle: &LedgerHandle, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::err(&Error::InvalidCall(format!("malformed request: {}", e))),
    };

    let caller = match Identity::parse(&request.caller) {
        Ok(caller) => caller,
        Err(e) => return Response::err(&e),
    };

    match handle.execute(caller, request.call).await {
        Ok(reply) => Response::ok(reply),
        Err(e) => Response::err(&e),
    }
}

/// Answer requests from `reader` until it is exhausted
async fn serve<R, W>(handle: &LedgerHandle, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let response = match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => handle_line(handle, &line).await,
            Ok(None) => {
                tracing::info!("Input closed");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!("Discarding request line: {}", e);
                Response::err(&Error::InvalidCall(
                    "request is not valid UTF-8".to_string(),
                ))
            }
            Err(e) => return Err(e).context("failed to read request"),
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stdout carries replies)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Invoice Ledger Server");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => Config::from_env().context("failed to load config from environment")?,
    };

    // Open ledger
    let service = LedgerService::open(config)
        .await
        .context("failed to open ledger")?;
    tracing::info!(
        data_dir = %service.config().data_dir.display(),
        persistent = service.config().storage.enabled,
        "Serving requests on stdin"
    );
    let handle = service.handle();

    let served = tokio::select! {
        result = serve(&handle, BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    // The journal is closed even when serving failed
    tracing::info!("Shutting down ledger server");
    service.shutdown().await?;
    served
}
