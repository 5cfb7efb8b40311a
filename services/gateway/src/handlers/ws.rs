//! Downstream subscriber sockets.
//!
//! Each client gets a bounded queue registered with the mirror. A writer task
//! drains the queue into the socket; the reader handles subscribe commands.
//! Whichever side finishes first tears down the other, and dropping the
//! subscription guard removes the client from the broadcast set.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use market_data::protocol::{ClientCommand, parse_client_command};
use market_data::{ChannelSubscriber, OrderBookMirror};
use relay_types::ids::SubscriberId;
use tracing::{debug, info, warn};

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber, mut outbound) =
        ChannelSubscriber::channel(state.config.mirror.subscriber_buffer);
    let guard = state.mirror.add_subscriber(Arc::new(subscriber));
    let subscriber_id = guard.id();
    info!(subscriber = %subscriber_id, "Frontend client connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            let text = match Utf8Bytes::try_from(payload) {
                Ok(text) => text,
                Err(e) => {
                    warn!(subscriber = %subscriber_id, error = %e, "Skipping non-UTF-8 payload");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mirror = Arc::clone(&state.mirror);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_command(&mirror, subscriber_id, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    drop(guard);
    info!(subscriber = %subscriber_id, "Frontend client disconnected");
}

fn handle_command(mirror: &OrderBookMirror, subscriber: SubscriberId, text: &str) {
    match parse_client_command(text) {
        Some(ClientCommand::Subscribe { assets }) => {
            for asset in &assets {
                let sent = mirror.subscribe_to_market(asset);
                debug!(
                    subscriber = %subscriber,
                    asset_id = %asset,
                    sent,
                    "Client market subscription"
                );
            }
        }
        None => debug!(subscriber = %subscriber, "Ignoring unrecognised client message"),
    }
}
