//! WebSocket upgrade handler and per-connection session loops

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::WorldEvent;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// How long a fresh connection gets to send its join message
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted player tag
const MAX_TAG_LEN: usize = 24;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    debug!("New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut shutdown = state.shutdown.clone();

    // The first message must be a valid join; anything else closes the
    // connection without creating state.
    let joined = tokio::select! {
        _ = shutdown.changed() => {
            debug!("Server shutting down, dropping pre-join connection");
            return;
        }
        joined = await_join(&mut ws_stream) => joined,
    };
    let tag = match joined {
        Ok(tag) => tag,
        Err(reason) => {
            warn!(reason, "Join rejected");
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    code: "invalid_join".to_string(),
                    message: reason.to_string(),
                },
            )
            .await;
            return;
        }
    };

    // Resolve the persisted identity before the join may proceed. A gateway
    // failure closes the connection with no player created.
    let record = match state.records.ensure(&tag).await {
        Ok(record) => record,
        Err(e) => {
            error!(tag = %tag, error = %e, "Persistence lookup failed, closing connection");
            return;
        }
    };

    let player_id = Uuid::new_v4();

    // Subscribe before joining so no snapshot between init and the first
    // periodic frame is missed.
    let snapshot_rx = state.world.subscribe();

    let (init_tx, init_rx) = oneshot::channel();
    let join = WorldEvent::Join {
        player_id,
        record_id: record.id,
        tag: tag.clone(),
        init_tx,
    };
    if state.world.event_tx.send(join).await.is_err() {
        error!(player_id = %player_id, "World is gone, closing connection");
        return;
    }

    // The joining client always gets a full initial frame, not merely the
    // next periodic broadcast.
    match init_rx.await {
        Ok(init) => {
            if let Err(e) = send_msg(&mut ws_sink, &init).await {
                error!(player_id = %player_id, error = %e, "Failed to send init");
                let _ = state
                    .world
                    .event_tx
                    .send(WorldEvent::Leave { player_id })
                    .await;
                return;
            }
        }
        Err(_) => {
            error!(player_id = %player_id, "World dropped the join reply");
            return;
        }
    }

    state.sessions.bind(player_id, tag.clone(), record.id);
    info!(player_id = %player_id, tag = %tag, "Session started");

    run_session(
        player_id,
        ws_sink,
        ws_stream,
        state.world.event_tx.clone(),
        snapshot_rx,
        shutdown,
    )
    .await;

    // Cleanup on disconnect; removal in the world is idempotent
    let _ = state
        .world
        .event_tx
        .send(WorldEvent::Leave { player_id })
        .await;
    state.sessions.unbind(&player_id);

    info!(player_id = %player_id, "Session closed");
}

/// Wait for the first message and require it to be a sane join
async fn await_join(
    ws_stream: &mut futures::stream::SplitStream<WebSocket>,
) -> Result<String, &'static str> {
    loop {
        let next = tokio::time::timeout(JOIN_TIMEOUT, ws_stream.next())
            .await
            .map_err(|_| "timed out waiting for join")?;

        match next {
            Some(Ok(Message::Text(text))) => {
                let msg: ClientMsg =
                    serde_json::from_str(&text).map_err(|_| "malformed join message")?;
                let ClientMsg::Join { tag } = msg else {
                    return Err("first message must be join");
                };
                return validate_tag(&tag);
            }
            // Control frames before the join are fine
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(_)) => return Err("unexpected message before join"),
            Some(Err(_)) | None => return Err("connection closed before join"),
        }
    }
}

/// Normalize and check a requested player tag
fn validate_tag(raw: &str) -> Result<String, &'static str> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err("empty tag");
    }
    if tag.len() > MAX_TAG_LEN {
        return Err("tag too long");
    }
    Ok(tag.to_string())
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    event_tx: mpsc::Sender<WorldEvent>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    mut shutdown: watch::Receiver<bool>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: broadcast snapshots -> WebSocket. A send failure ends this
    // connection only; other deliveries are unaffected.
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - snapshots are full state, nothing is lost
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> world event queue. Also watches the shutdown
    // flag so an idle client cannot keep the connection open past it.
    loop {
        let result = tokio::select! {
            _ = shutdown.changed() => {
                info!(player_id = %player_id, "Server shutting down, closing session");
                break;
            }
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
        };
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                // Malformed/unknown messages are dropped and logged; the
                // connection stays open.
                let msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let event = match msg {
                    ClientMsg::Move { x, y } => WorldEvent::Move { player_id, x, y },
                    ClientMsg::Charge { active } => WorldEvent::Charge { player_id, active },
                    ClientMsg::Leave => {
                        debug!(player_id = %player_id, "Client left");
                        break;
                    }
                    ClientMsg::Join { .. } => {
                        warn!(player_id = %player_id, "Duplicate join ignored");
                        continue;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    debug!(player_id = %player_id, "Event channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
