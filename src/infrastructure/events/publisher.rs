//! Event Publisher Implementation
//!
//! 进度事件推送：生成任务、章节、有声书、发布
//! 轮询查询仍是权威数据源，事件只用于及时刷新

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::audiobook::AudiobookJob;
use crate::domain::generation::{Chapter, GenerationJob};

const CHANNEL_CAPACITY: usize = 100;

/// WebSocket 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 生成任务状态或进度变更
    JobStateChanged {
        book_id: Uuid,
        job_id: Uuid,
        status: String,
        current_chapter: u32,
        total_chapters: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 章节子状态变更
    ChapterProgress {
        book_id: Uuid,
        chapter_number: u32,
        status: String,
    },
    /// 有声书任务进度
    AudiobookProgress {
        book_id: Uuid,
        job_id: Uuid,
        status: String,
        current_chapter: u32,
        completed_chapters: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 发布完成
    BookPublished {
        book_id: Uuid,
        formats: Vec<String>,
        forced: bool,
    },
}

impl WsEvent {
    pub fn book_id(&self) -> Uuid {
        match self {
            WsEvent::JobStateChanged { book_id, .. }
            | WsEvent::ChapterProgress { book_id, .. }
            | WsEvent::AudiobookProgress { book_id, .. }
            | WsEvent::BookPublished { book_id, .. } => *book_id,
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// book_id -> broadcast sender（只关心单本书的订阅者）
    book_channels: DashMap<Uuid, broadcast::Sender<WsEvent>>,
    /// 全局广播
    global_channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            book_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<WsEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅单本书的事件
    pub fn subscribe_book(&self, book_id: Uuid) -> broadcast::Receiver<WsEvent> {
        self.book_channels
            .entry(book_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 最后一个订阅者离开后移除通道
    pub fn release_book(&self, book_id: Uuid) {
        self.book_channels
            .remove_if(&book_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn publish_job(&self, job: &GenerationJob) {
        self.publish(WsEvent::JobStateChanged {
            book_id: job.book_id,
            job_id: job.id,
            status: job.status().as_str().to_string(),
            current_chapter: job.current_chapter,
            total_chapters: job.total_chapters,
            error: job.error().map(str::to_string),
        });
    }

    pub fn publish_chapter(&self, chapter: &Chapter) {
        self.publish(WsEvent::ChapterProgress {
            book_id: chapter.book_id,
            chapter_number: chapter.number,
            status: chapter.status().as_str().to_string(),
        });
    }

    pub fn publish_audiobook(&self, job: &AudiobookJob) {
        self.publish(WsEvent::AudiobookProgress {
            book_id: job.book_id,
            job_id: job.id,
            status: job.status().as_str().to_string(),
            current_chapter: job.current_chapter,
            completed_chapters: job.progress.len(),
            error: job.error().map(str::to_string),
        });
    }

    pub fn publish_book_published(&self, book_id: Uuid, formats: Vec<String>, forced: bool) {
        self.publish(WsEvent::BookPublished {
            book_id,
            formats,
            forced,
        });
    }

    /// 同时发送到全局通道和该书的通道
    fn publish(&self, event: WsEvent) {
        let book_id = event.book_id();
        if let Some(sender) = self.book_channels.get(&book_id) {
            if let Err(e) = sender.send(event.clone()) {
                tracing::debug!(book_id = %book_id, error = %e, "Failed to publish event (no receivers)");
            }
        }
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(book_id = %book_id, error = %e, "Failed to publish global event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_book_subscribers_only_see_their_book() {
        let publisher = EventPublisher::new();
        let book_a = Uuid::new_v4();
        let book_b = Uuid::new_v4();
        let mut rx_a = publisher.subscribe_book(book_a);
        let mut rx_all = publisher.subscribe_global();

        publisher.publish_book_published(book_b, vec!["epub".into()], false);
        publisher.publish_book_published(book_a, vec!["docx".into()], true);

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.book_id(), book_a);
        assert_eq!(rx_all.recv().await.unwrap().book_id(), book_b);
        assert_eq!(rx_all.recv().await.unwrap().book_id(), book_a);
    }

    #[test]
    fn test_release_keeps_channel_with_live_receivers() {
        let publisher = EventPublisher::new();
        let book = Uuid::new_v4();
        let rx = publisher.subscribe_book(book);
        publisher.release_book(book);
        assert!(publisher.book_channels.contains_key(&book));
        drop(rx);
        publisher.release_book(book);
        assert!(!publisher.book_channels.contains_key(&book));
    }

    #[test]
    fn test_event_wire_format() {
        let event = WsEvent::ChapterProgress {
            book_id: Uuid::nil(),
            chapter_number: 2,
            status: "complete".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ChapterProgress");
        assert_eq!(json["data"]["chapter_number"], 2);
    }
}
