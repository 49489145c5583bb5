//! Control connection to the master.
//!
//! Connects to the master's websocket endpoint and feeds every text frame
//! to the [`ConnectionManager`]. Handler replies travel back through the
//! connection's outbound channel. The loop reconnects forever and only
//! returns once `cancel` fires.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use warden_protocol::reconnect::ReconnectConfig;
use warden_protocol::{Connection, ConnectionManager};

/// Header carrying the node's display name.
pub const WORKER_NAME_HEADER: &str = "x-worker-name";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub api_key: String,
    pub worker_name: String,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid control URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// Build the upgrade request with the node's credentials.
pub fn build_request(config: &SessionConfig) -> Result<Request<()>, SessionError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| SessionError::InvalidUrl(e.to_string()))?;

    let headers = request.headers_mut();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| SessionError::InvalidHeader("Authorization"))?,
    );
    headers.insert(
        WORKER_NAME_HEADER,
        HeaderValue::from_str(&config.worker_name)
            .map_err(|_| SessionError::InvalidHeader("X-Worker-Name"))?,
    );
    Ok(request)
}

/// Run the connect loop until `cancel` fires.
pub async fn run(
    config: &SessionConfig,
    manager: Arc<ConnectionManager>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let mut delay = config.reconnect.base;

    while !cancel.is_cancelled() {
        let request = build_request(config)?;
        tracing::info!(url = %config.url, "Connecting to master");

        tokio::select! {
            _ = cancel.cancelled() => break,
            connected = connect_async(request) => match connected {
                Ok((ws_stream, _response)) => {
                    tracing::info!("Control connection established");
                    delay = config.reconnect.base;
                    run_session(ws_stream, &manager, &cancel).await;
                    if cancel.is_cancelled() {
                        break;
                    }
                    tracing::warn!("Control connection lost, reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, retry_in_secs = delay.as_secs_f64(), "Control connection failed");
                }
            },
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.reconnect.next(delay).max(Duration::from_millis(1));
    }

    tracing::info!("Control loop stopped");
    Ok(())
}

/// Drive one websocket session.
///
/// Inbound frames are handled inline, so commands on this connection are
/// processed strictly in arrival order.
async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    manager: &ConnectionManager,
    cancel: &CancellationToken,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let (conn, mut outbound) = Connection::channel("master");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(envelope) = outbound.recv() => {
                let text = match envelope.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to serialize envelope");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::error!(error = %e, "Failed to send to master");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        manager.on_message_received(&conn, &text).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Master closed the control connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary / Frame -- ignore.
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Control connection receive error");
                        break;
                    }
                    None => {
                        tracing::info!("Control connection stream exhausted");
                        break;
                    }
                }
            }
        }
    }
}
