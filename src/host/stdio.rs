//! Stdin/stdout JSONL bridge.
//!
//! Reads newline-delimited `CommandEnvelope` JSON from stdin, routes each
//! command through the [`HostCommandServer`], and writes `ResponseEnvelope`
//! and `EventEnvelope` lines to stdout.
//!
//! Stdout carries the protocol and nothing else; all diagnostics go to
//! stderr via tracing.

use crate::error::{AutomatorError, Result};
use crate::host::channel::{
    command_channel, command_channel_with_events, BackgroundCommands, HostCommandClient,
    HostCommandServer,
};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{broadcast, Mutex};

/// Command queue depth for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Event broadcast depth for the stdio bridge.
const EVENT_CAPACITY: usize = 128;

/// Run the bridge until stdin closes or a `host.stop` command arrives.
pub async fn run_stdio_bridge<H: BackgroundCommands>(handler: H) -> Result<()> {
    let (client, server) = command_channel(REQUEST_CAPACITY, EVENT_CAPACITY, handler);
    drive_bridge(client, server).await
}

/// Run the bridge over an existing event broadcast sender, so events the
/// engine emits on its own (alarm notifications, chat deltas) flow out
/// through the same stdout writer.
pub async fn run_stdio_bridge_with_events<H: BackgroundCommands>(
    handler: H,
    event_tx: broadcast::Sender<EventEnvelope>,
) -> Result<()> {
    let (client, server) = command_channel_with_events(REQUEST_CAPACITY, event_tx, handler);
    drive_bridge(client, server).await
}

/// Three concurrent pieces: the router server task, the event forwarder
/// task, and the stdin reader running on the current task. When the
/// reader finishes (EOF or `host.stop`) the client drops, the request
/// channel closes and the server drains out.
async fn drive_bridge<H: BackgroundCommands>(
    client: HostCommandClient,
    server: HostCommandServer<H>,
) -> Result<()> {
    let stdout = tokio::io::stdout();
    let writer = Arc::new(Mutex::new(BufWriter::new(stdout)));

    let server_handle = tokio::spawn(server.run());

    let event_writer = Arc::clone(&writer);
    let mut event_rx = client.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event_envelope) => match serde_json::to_string(&event_envelope) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut w, &json).await {
                            tracing::warn!(
                                error = %e,
                                "cannot write event to stdout; stopping event forwarder"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "cannot serialize event envelope; skipping");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event channel closed; stopping event forwarder");
                    break;
                }
            }
        }
    });

    let reader_result = run_reader(client, Arc::clone(&writer)).await;

    event_handle.abort();
    let _ = event_handle.await;
    let _ = server_handle.await;

    reader_result
}

/// Read stdin line by line, dispatch each command, write each response.
async fn run_reader(
    client: HostCommandClient,
    writer: Arc<Mutex<BufWriter<tokio::io::Stdout>>>,
) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| AutomatorError::Channel(format!("cannot read from stdin: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("stdin closed; shutting down stdio bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "cannot parse command envelope");
                let error_response = ResponseEnvelope::error(
                    "parse-error",
                    format!("cannot parse command envelope: {e}"),
                );
                write_response(&writer, &error_response).await?;
                continue;
            }
        };

        let request_id = envelope.request_id.clone();
        let is_stop = envelope.command == CommandName::HostStop;

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, request_id = %request_id, "command failed");
                ResponseEnvelope::error(request_id, e.to_string())
            }
        };
        write_response(&writer, &response).await?;

        if is_stop {
            tracing::info!("host.stop received; shutting down stdio bridge");
            break;
        }
    }

    Ok(())
}

async fn write_response(
    writer: &Arc<Mutex<BufWriter<tokio::io::Stdout>>>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| AutomatorError::Protocol(format!("cannot serialize response: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut w, &json).await
}

/// Write one JSON line and flush.
async fn write_line(writer: &mut BufWriter<tokio::io::Stdout>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| AutomatorError::Channel(format!("cannot write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| AutomatorError::Channel(format!("cannot write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| AutomatorError::Channel(format!("cannot flush stdout: {e}")))
}
