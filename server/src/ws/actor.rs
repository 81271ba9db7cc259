use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant};

use crate::chat::ConnectionId;
use crate::state::AppState;
use crate::ws::heartbeat::PingTracker;
use crate::ws::protocol;

/// Run the actor-per-connection pattern for one WebSocket.
///
/// The connection joins the broadcast set immediately but stays
/// unregistered until the client sends `register`.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes incoming frames, feeds them to the chatroom and
///   pings the peer; a ping left unanswered past the timeout ends the loop
///   like a close would
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let conn = ConnectionId::new();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    state.connections.insert(conn, tx.clone());

    tracing::info!(
        conn_id = %conn,
        connections = state.connections.len(),
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let heartbeat = state.heartbeat;
    // First ping one interval after connect, not immediately
    let mut ping_timer = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    let mut pings = PingTracker::new();

    loop {
        // Only polled while a ping is outstanding
        let pong_deadline = pings.deadline();
        let expiry = sleep_until(pong_deadline.unwrap_or_else(|| Instant::now() + heartbeat.timeout));

        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(msg)) => match msg {
                    Message::Text(text) => {
                        protocol::handle_text_message(text.as_str(), conn, &state);
                    }
                    Message::Binary(data) => {
                        tracing::debug!(
                            conn_id = %conn,
                            len = data.len(),
                            "Received binary frame (expected JSON text), ignoring"
                        );
                    }
                    Message::Pong(data) => {
                        if !pings.pong(&data) {
                            tracing::debug!(conn_id = %conn, "Ignoring unsolicited pong");
                        }
                    }
                    Message::Ping(data) => {
                        let _ = tx.send(Message::Pong(data));
                    }
                    Message::Close(frame) => {
                        tracing::info!(
                            conn_id = %conn,
                            reason = ?frame,
                            "Client initiated close"
                        );
                        break;
                    }
                },
                Some(Err(e)) => {
                    tracing::warn!(
                        conn_id = %conn,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::info!(conn_id = %conn, "WebSocket stream ended");
                    break;
                }
            },
            _ = ping_timer.tick() => {
                let payload = pings.ping(Instant::now(), heartbeat.timeout);
                if tx.send(Message::Ping(payload.into())).is_err() {
                    // Writer task has died, connection is gone
                    break;
                }
            }
            () = expiry, if pong_deadline.is_some() => {
                tracing::warn!(conn_id = %conn, "Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }

    // Leave the broadcast set first so the departure notice only reaches
    // the remaining connections.
    state.connections.remove(&conn);
    protocol::handle_disconnect(conn, &state);

    // Let the writer flush anything already queued (a close frame on
    // timeout) before it stops.
    drop(tx);
    if tokio::time::timeout(heartbeat.timeout, &mut writer_handle)
        .await
        .is_err()
    {
        tracing::debug!(conn_id = %conn, "Writer did not drain in time");
        writer_handle.abort();
    }

    tracing::info!(
        conn_id = %conn,
        connections = state.connections.len(),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}
