//! Channel Work Queue - 唤醒后台 worker 的内存通道

use tokio::sync::mpsc;

use crate::application::ports::{WorkKind, WorkQueuePort};

/// worker 侧的唤醒接收端
pub struct WakeReceivers {
    pub generation: mpsc::Receiver<()>,
    pub audiobook: mpsc::Receiver<()>,
}

/// 基于容量为 1 的 mpsc 通道，未消费的唤醒会合并
pub struct ChannelWorkQueue {
    generation: mpsc::Sender<()>,
    audiobook: mpsc::Sender<()>,
}

impl ChannelWorkQueue {
    pub fn new() -> (Self, WakeReceivers) {
        let (generation_tx, generation_rx) = mpsc::channel(1);
        let (audiobook_tx, audiobook_rx) = mpsc::channel(1);
        (
            Self {
                generation: generation_tx,
                audiobook: audiobook_tx,
            },
            WakeReceivers {
                generation: generation_rx,
                audiobook: audiobook_rx,
            },
        )
    }
}

impl WorkQueuePort for ChannelWorkQueue {
    fn wake(&self, kind: WorkKind) {
        let sender = match kind {
            WorkKind::Generation => &self.generation,
            WorkKind::Audiobook => &self.audiobook,
        };
        match sender.try_send(()) {
            Ok(()) => tracing::debug!(kind = ?kind, "Worker woken"),
            // 已有未消费的唤醒
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(kind = ?kind, "Worker channel closed, job will wait for next poll");
            }
        }
    }
}
