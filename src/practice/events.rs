//! 会话事件
//!
//! 会话直接通过自身持有的通道向宿主推送事件，不经过全局广播总线。

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::mode::SessionMode;
use super::types::ReviewOutcome;

/// 会话事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ScopeReset {
        scope_key: String,
        mode: SessionMode,
    },
    ConceptActivated {
        concept_id: String,
        cursor_index: usize,
    },
    DrillsAppended {
        concept_id: String,
        accepted: usize,
        queue_length: usize,
    },
    ConceptExhausted {
        concept_id: String,
    },
    CursorAdvanced {
        cursor_index: usize,
    },
    GenerationFailed {
        concept_id: String,
        error: String,
    },
    ReviewRecorded {
        concept_id: String,
        skipped: bool,
        completed_count: u32,
        outcome: Option<ReviewOutcome>,
    },
    SubmissionFailed {
        concept_id: String,
        error: String,
    },
    CaughtUp,
    NotAvailable {
        concept_id: String,
    },
}

/// 事件发送端；未订阅时静默丢弃
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// 创建通道，返回发送端与接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("[PracticeSession] Event receiver dropped");
            }
        }
    }
}
