//! Per-connection WebSocket handling.
//!
//! Each accepted socket claims a player name through its path
//! (`/ws/{player_name}`), asks the room for admission, then runs a writer
//! task draining its outbound queue and a reader loop forwarding intents.

use crate::broadcast::ClientHandle;
use crate::error::ServerError;
use crate::protocol::{Intent, Notification, Outbound};
use crate::room::RoomHandle;
use crate::ConnectionId;
use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;

const PATH_PREFIX: &str = "/ws/";

/// Serves one client from handshake to close.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    room: RoomHandle,
    idle_timeout: Duration,
) -> Result<(), ServerError> {
    let mut claimed = None;
    let callback = |request: &Request, response: Response| {
        match player_name_from_path(request.uri().path()) {
            Some(name) => {
                claimed = Some(name);
                Ok(response)
            }
            None => {
                let mut rejection =
                    ErrorResponse::new(Some(format!("expected {PATH_PREFIX}{{player_name}}")));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let ws_stream = accept_hdr_async(stream, callback)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed for {addr}: {e}")))?;
    let Some(name) = claimed else {
        return Err(ServerError::Internal("handshake accepted without a player name".into()));
    };

    let (mut ws_sink, ws_receiver) = ws_stream.split();
    let (handle, outbound) = ClientHandle::new();

    let conn_id = match room.connect(&name, addr.ip(), handle.clone()).await {
        Ok(conn_id) => conn_id,
        Err(ServerError::Admission(refusal)) => {
            warn!("🚫 Refused {} from {}: {}", name, addr, refusal);
            let frame = close_frame(refusal.close_code(), &refusal.to_string());
            let _ = ws_sink.send(Message::Close(Some(frame))).await;
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    info!("🔗 {} connected from {} as connection #{}", name, addr, conn_id);

    let writer = tokio::spawn(write_outbound(ws_sink, outbound));
    let reason = read_intents(&name, conn_id, ws_receiver, &room, &handle, idle_timeout).await;
    drop(handle);

    info!("🔌 {} (connection #{}) closed: {}", name, conn_id, reason);
    if room.disconnected(&name, conn_id, reason).await.is_err() {
        debug!("Room already stopped while closing {}", name);
    }
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", name, e);
    }
    Ok(())
}

/// Forwards client intents to the room until the connection ends.
/// Returns the disconnect reason.
async fn read_intents<S>(
    name: &str,
    conn_id: ConnectionId,
    mut ws_receiver: S,
    room: &RoomHandle,
    handle: &ClientHandle,
    idle_timeout: Duration,
) -> String
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let message = match tokio::time::timeout(idle_timeout, ws_receiver.next()).await {
            Ok(Some(message)) => message,
            Ok(None) => return "connection closed".to_string(),
            Err(_) => {
                debug!("{} idle for {:?}, probing", name, idle_timeout);
                if handle.send(&Notification::Ping).is_err() {
                    return "liveness probe failed".to_string();
                }
                continue;
            }
        };

        match message {
            Ok(Message::Text(text)) => match Intent::parse(text.as_str()) {
                Ok(intent) => {
                    if room.intent(name, conn_id, intent).await.is_err() {
                        return "server shutting down".to_string();
                    }
                }
                Err(e) => {
                    warn!("Malformed message from {}: {}", name, e);
                    let _ = handle.send(&Notification::error(
                        format!("Invalid message: {e}"),
                        None,
                    ));
                }
            },
            Ok(Message::Close(frame)) => {
                return frame
                    .map(|frame| format!("client closed ({})", u16::from(frame.code)))
                    .unwrap_or_else(|| "client closed".to_string());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(_) => warn!("Received unsupported message type from {}", name),
            Err(e) => {
                error!("WebSocket error for {}: {}", name, e);
                return format!("transport error: {e}");
            }
        }
    }
}

/// Drains the outbound queue into the socket. Ends on a close request, a
/// send failure, or once every sender is gone.
async fn write_outbound(mut ws_sink: WsSink, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(frame) = outbound.recv().await {
        let result = match frame {
            Outbound::Text(text) => ws_sink.send(Message::text(text)).await,
            Outbound::Close { code, reason } => {
                let _ = ws_sink
                    .send(Message::Close(Some(close_frame(code, &reason))))
                    .await;
                break;
            }
        };
        if let Err(e) = result {
            debug!("Socket write failed: {}", e);
            break;
        }
    }
    let _ = ws_sink.close().await;
}

fn close_frame(code: u16, reason: &str) -> CloseFrame {
    CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    }
}

/// Extracts and percent-decodes the player name from `/ws/{player_name}`.
pub fn player_name_from_path(path: &str) -> Option<String> {
    let raw = path.strip_prefix(PATH_PREFIX)?;
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    let name = percent_decode(raw)?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = input.get(i + 1..i + 3)?;
                if !hex.bytes().all(|digit| digit.is_ascii_hexdigit()) {
                    return None;
                }
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_silent_client_is_pinged_then_dropped_when_unreachable() {
        let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let room = RoomHandle::spawn(ServerConfig::default(), shutdown_rx);
        let (handle, mut outbound) = ClientHandle::new();

        let reader = tokio::spawn(async move {
            let silent = futures::stream::pending::<Result<Message, WsError>>();
            read_intents("A", 0, silent, &room, &handle, Duration::from_millis(20)).await
        });

        let Some(Outbound::Text(text)) = outbound.recv().await else {
            panic!("expected a ping frame");
        };
        let ping: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(ping["type"], "ping");

        drop(outbound);
        assert_eq!(reader.await.unwrap(), "liveness probe failed");
    }

    #[test]
    fn test_player_name_from_path() {
        assert_eq!(player_name_from_path("/ws/Alice"), Some("Alice".to_string()));
        assert_eq!(player_name_from_path("/ws/Big%20Bob"), Some("Big Bob".to_string()));
        assert_eq!(
            player_name_from_path("/ws/%E5%BC%A0%E4%B8%89"),
            Some("张三".to_string())
        );
        assert_eq!(player_name_from_path("/ws/"), None);
        assert_eq!(player_name_from_path("/ws/%20"), None);
        assert_eq!(player_name_from_path("/ws/a/b"), None);
        assert_eq!(player_name_from_path("/other/Alice"), None);
        assert_eq!(player_name_from_path("/ws/bad%2"), None);
        assert_eq!(player_name_from_path("/ws/bad%zz"), None);
        assert_eq!(player_name_from_path("/ws/%+1"), None);
        assert_eq!(player_name_from_path("/ws/a%+Fb"), None);
    }
}
