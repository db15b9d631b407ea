//! WebSocket Handler - 进度事件推送
//!
//! `/ws/events` 推送全部事件，`/ws/events?book_id=...` 只推送单本书

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::infrastructure::events::WsEvent;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub book_id: Option<Uuid>,
}

/// 进度事件 WebSocket
pub async fn events_websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<EventsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events_socket(socket, query.book_id, state))
}

async fn handle_events_socket(socket: WebSocket, book_id: Option<Uuid>, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx: broadcast::Receiver<WsEvent> = match book_id {
        Some(id) => state.event_publisher.subscribe_book(id),
        None => state.event_publisher.subscribe_global(),
    };

    tracing::info!(book_id = ?book_id, "Events WebSocket connected");

    // 事件转发任务
    let forward_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped = skipped, "Events WebSocket lagged, dropping events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // 接收客户端消息（心跳）
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::debug!("Events WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Events WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    let mut forward_task = forward_task;
    let mut receive_task = receive_task;
    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    // forward 任务结束后接收器已被释放，才能回收该书的通道
    let _ = forward_task.await;
    if let Some(id) = book_id {
        state.event_publisher.release_book(id);
    }
    tracing::info!(book_id = ?book_id, "Events WebSocket disconnected");
}
