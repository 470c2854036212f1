//! 自适应练习队列引擎
//!
//! 为一次练习会话维护单个活跃概念的有序、去重、预取的题目队列，
//! 并在每次评分或跳过后推进会话。
//!
//! ## 模块组成
//! - `mode`: 会话模式解析（计划 / 专注）与作用域键
//! - `queue`: 补题状态机，出题请求凭据与过期响应丢弃
//! - `review`: 评分与跳过的提交流水线
//! - `session`: 异步会话驱动，连接外部服务与状态机
//! - `types`: 实体与归一化边界
//! - `events`: 会话事件通道
//!
//! ## 使用示例
//! ```rust,ignore
//! let config = PracticeConfig::from_env_and_file(None)?;
//! let clients = PracticeClients::http(&config)?;
//! let mut session = PracticeSession::new(config, clients, None);
//! let mut events = session.subscribe();
//! session.mount().await;
//! session.grade(GradeInput { rating: Rating::Good, review_duration_ms: 3200, answer: None }).await?;
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod mode;
pub mod queue;
pub mod review;
pub mod session;
pub mod types;

pub use config::{PracticeConfig, RefillPolicy};
pub use dedup::{normalize_question, DedupKey};
pub use error::{PracticeError, PracticeResult};
pub use events::{EventSink, SessionEvent};
pub use mode::{ModeResolver, Resolution, ScopeKey, SessionMode};
pub use queue::{
    ConceptSlot, GenerationApplied, GenerationState, GenerationTicket, QueueCommand, QueueState,
    SessionPhase, SessionSummary,
};
pub use review::{Completion, GradeInput, SubmissionTicket, MIN_REVIEW_DURATION_MS, SKIP_RATING};
pub use session::{PracticeClients, PracticeSession, SessionSnapshot};
pub use types::{
    normalize_concept, normalize_drill, normalize_outcome, Attempt, Concept, ConceptFrontier,
    Drill, DrillBatch, DrillRequest, Rating, RawFrontier, ReviewBatchResponse, ReviewMetadata,
    ReviewOutcome, ReviewSubmission,
};
