use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use guidepost_types::events::{GatewayCommand, GatewayEvent};
use guidepost_types::models::Participant;

use crate::lifecycle::{LifecycleManager, Session};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Run one WebSocket connection for a participant whose handshake has
/// already been validated. Returns once the connection is closed and the
/// participant has been unregistered.
pub async fn handle_connection(socket: WebSocket, lifecycle: LifecycleManager, participant: Participant) {
    let (mut sender, mut receiver) = socket.split();

    if !send_event(&mut sender, &GatewayEvent::Ready { participant }).await {
        return;
    }

    let (session, mut events) = lifecycle.connect(participant).await;
    let session = Arc::new(session);
    info!("{} connected to gateway ({})", participant, session.connection_id());

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat. Ends when the registry
    // drops our handle (displaced by a newer connection) or the socket fails.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = sender.close().await;
    });

    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if !handle_command(&recv_session, cmd).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_session.participant(),
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    let recv_finished = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            false
        }
        _ = &mut recv_task => {
            send_task.abort();
            true
        }
    };

    // An aborted recv task still owns its session clone until it unwinds.
    if !recv_finished {
        let _ = recv_task.await;
    }
    match Arc::try_unwrap(session) {
        Ok(session) => session.disconnect().await,
        Err(_) => warn!("{} session still shared at disconnect", participant),
    }
    info!("{} disconnected from gateway", participant);
}

/// Returns false when the session should end.
async fn handle_command(session: &Session, cmd: GatewayCommand) -> bool {
    match cmd {
        GatewayCommand::RequestPresence => {
            if session.send_presence().await.is_none() {
                debug!("{} presence request on a displaced connection", session.participant());
                return false;
            }
            true
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
