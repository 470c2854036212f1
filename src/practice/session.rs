//! 练习会话驱动
//!
//! `PracticeSession` 将三个外部服务接到纯状态机 [`QueueState`] 上：
//! 挂载时拉取概念前沿并解析活跃概念，随后根据状态机发出的命令出题或推进游标。
//! 评分、跳过、切换专注概念、刷新前沿都以 `&mut self` 顺序执行，
//! 每次状态变化后重新运行补题策略。

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::PracticeConfig;
use super::error::PracticeResult;
use super::events::{EventSink, SessionEvent};
use super::mode::{ModeResolver, Resolution, ScopeKey, SessionMode};
use super::queue::{
    ConceptSlot, GenerationApplied, QueueCommand, QueueState, SessionPhase, SessionSummary,
};
use super::review::{Completion, GradeInput, SubmissionTicket};
use super::types::{ConceptFrontier, Drill, ReviewOutcome, ReviewSubmission};
use crate::clients::{
    CachedFrontierClient, ConceptFrontierClient, DrillGeneratorClient, HttpPracticeClient,
    ReviewSubmissionClient,
};

/// 会话使用的三个外部服务
#[derive(Clone)]
pub struct PracticeClients {
    pub frontier: Arc<dyn ConceptFrontierClient>,
    pub generator: Arc<dyn DrillGeneratorClient>,
    pub reviews: Arc<dyn ReviewSubmissionClient>,
}

impl PracticeClients {
    pub fn new(
        frontier: Arc<dyn ConceptFrontierClient>,
        generator: Arc<dyn DrillGeneratorClient>,
        reviews: Arc<dyn ReviewSubmissionClient>,
    ) -> Self {
        Self {
            frontier,
            generator,
            reviews,
        }
    }

    /// 基于配置构建 HTTP 客户端，概念前沿带 TTL 缓存
    pub fn http(config: &PracticeConfig) -> PracticeResult<Self> {
        let http = Arc::new(HttpPracticeClient::new(config)?);
        let frontier = Arc::new(CachedFrontierClient::new(
            http.clone(),
            config.frontier_cache_ttl(),
        ));
        Ok(Self {
            frontier,
            generator: http.clone(),
            reviews: http,
        })
    }
}

/// 宿主展示用的会话快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub due_count: usize,
    pub frontier_error: Option<String>,
    pub last_outcome: Option<ReviewOutcome>,
    pub head: Option<Drill>,
}

/// 单个练习会话
pub struct PracticeSession {
    session_id: String,
    config: PracticeConfig,
    clients: PracticeClients,
    resolver: ModeResolver,
    frontier: ConceptFrontier,
    frontier_error: Option<String>,
    state: QueueState,
    last_outcome: Option<ReviewOutcome>,
    events: EventSink,
}

impl PracticeSession {
    pub fn new(config: PracticeConfig, clients: PracticeClients, focus: Option<&str>) -> Self {
        let resolver = ModeResolver::new(focus, config.session_tag.clone());
        let mode = resolver.mode();
        let state = QueueState::new(mode, resolver.scope_key(), config.policy_for(mode));
        Self {
            session_id: Uuid::new_v4().to_string(),
            config,
            clients,
            resolver,
            frontier: ConceptFrontier::default(),
            frontier_error: None,
            state,
            last_outcome: None,
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// 订阅会话事件；替换之前的订阅
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (sink, rx) = EventSink::channel();
        self.events = sink;
        rx
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 挂载：拉取前沿、重置作用域、解析活跃概念并补题
    ///
    /// 前沿拉取失败不致命：按空前沿处理（计划模式显示已完成），错误写入 `frontier_error`。
    pub async fn mount(&mut self) -> SessionSnapshot {
        info!(
            "[PracticeSession] Mounting session {} (mode={}, scope={})",
            self.session_id,
            self.resolver.mode(),
            self.resolver.scope_key()
        );
        self.load_frontier().await;
        self.reset_scope();
        self.resolve_active();
        self.refill().await;
        self.snapshot()
    }

    /// 丢弃前沿缓存并重新挂载
    ///
    /// 游标指向挂载时的到期列表，列表刷新后作用域随之重置。
    pub async fn refresh_frontier(&mut self) -> SessionSnapshot {
        self.clients.frontier.invalidate().await;
        self.mount().await
    }

    /// 切换专注概念；`None` 或空白回到计划模式
    ///
    /// 作用域键或模式不变时为空操作，否则全量重置。
    pub async fn set_focus(&mut self, focus: Option<&str>) -> SessionSnapshot {
        let resolver = ModeResolver::new(focus, self.config.session_tag.clone());
        if resolver == self.resolver {
            debug!(
                "[PracticeSession] Focus unchanged (scope={})",
                self.resolver.scope_key()
            );
            return self.snapshot();
        }

        self.resolver = resolver;
        self.reset_scope();
        self.resolve_active();
        self.refill().await;
        self.snapshot()
    }

    /// 运行补题策略直到状态机不再发出命令
    ///
    /// 出题失败时停止，等待下一次自然触发（评分、跳过或再次调用本方法）重试。
    pub async fn refill(&mut self) {
        while let Some(command) = self.state.on_queue_changed() {
            match command {
                QueueCommand::Generate(ticket) => {
                    let result = self
                        .clients
                        .generator
                        .fetch_practice_drills(&ticket.request)
                        .await;
                    let concept_id = ticket.concept_id().to_string();
                    match self.state.apply_generation(&ticket, result) {
                        GenerationApplied::Appended { accepted, .. } => {
                            self.events.emit(SessionEvent::DrillsAppended {
                                concept_id,
                                accepted,
                                queue_length: self.state.len(),
                            });
                        }
                        GenerationApplied::Exhausted { .. } => {
                            self.events
                                .emit(SessionEvent::ConceptExhausted { concept_id });
                        }
                        GenerationApplied::Failed { error } => {
                            self.events
                                .emit(SessionEvent::GenerationFailed { concept_id, error });
                            break;
                        }
                        GenerationApplied::Stale => break,
                    }
                }
                QueueCommand::AdvanceCursor { cursor_index } => {
                    self.events
                        .emit(SessionEvent::CursorAdvanced { cursor_index });
                    self.resolve_active();
                }
            }
        }
    }

    // ========================================================================
    // 评分与跳过
    // ========================================================================

    /// 对队首评分
    pub async fn grade(&mut self, input: GradeInput) -> PracticeResult<Completion> {
        let (ticket, submission) = self.state.prepare_grade(input)?;
        self.submit(ticket, submission).await
    }

    /// 跳过队首
    pub async fn skip(&mut self, review_duration_ms: u64) -> PracticeResult<Completion> {
        let (ticket, submission) = self.state.prepare_skip(review_duration_ms)?;
        self.submit(ticket, submission).await
    }

    async fn submit(
        &mut self,
        ticket: SubmissionTicket,
        submission: ReviewSubmission,
    ) -> PracticeResult<Completion> {
        let skipped = submission.is_skip();
        let response = match self
            .clients
            .reviews
            .submit_review(std::slice::from_ref(&submission))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if self.state.fail_submission(&ticket, &e) {
                    self.events.emit(SessionEvent::SubmissionFailed {
                        concept_id: ticket.concept_id.clone(),
                        error: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        let outcome = response
            .normalized()
            .into_iter()
            .find(|o| o.concept_id == ticket.concept_id);
        let completion = self.state.complete_submission(&ticket)?;

        if outcome.is_some() {
            self.last_outcome = outcome.clone();
        }
        self.events.emit(SessionEvent::ReviewRecorded {
            concept_id: ticket.concept_id.clone(),
            skipped,
            completed_count: completion.completed_count,
            outcome,
        });

        if let Some(cursor_index) = completion.advanced_cursor_to {
            self.events
                .emit(SessionEvent::CursorAdvanced { cursor_index });
            self.resolve_active();
        }
        self.refill().await;

        Ok(completion)
    }

    // ========================================================================
    // 内部
    // ========================================================================

    async fn load_frontier(&mut self) {
        match self.clients.frontier.fetch_concept_frontier().await {
            Ok(raw) => {
                self.frontier = ConceptFrontier::from_raw(&raw);
                self.frontier_error = None;
                info!(
                    "[PracticeSession] Frontier loaded: due={}, frontier={}, coming_soon={}",
                    self.frontier.due_for_review.len(),
                    self.frontier.frontier.len(),
                    self.frontier.coming_soon.len()
                );
            }
            Err(e) => {
                warn!("[PracticeSession] Frontier unavailable: {}", e);
                self.frontier = ConceptFrontier::default();
                self.frontier_error = Some(e.to_string());
            }
        }
    }

    fn reset_scope(&mut self) {
        let mode = self.resolver.mode();
        let scope_key = self.resolver.scope_key();
        self.state
            .reset_scope(mode, scope_key.clone(), self.config.policy_for(mode));
        self.last_outcome = None;
        self.events.emit(SessionEvent::ScopeReset {
            scope_key: scope_key.to_string(),
            mode,
        });
    }

    fn resolve_active(&mut self) {
        let resolution = self
            .resolver
            .resolve(&self.frontier, self.state.cursor_index());

        let event = match (&resolution, self.state.slot()) {
            (Resolution::Active(next), ConceptSlot::Active(current))
                if current.concept_id == next.concept_id =>
            {
                None
            }
            (Resolution::Active(next), _) => Some(SessionEvent::ConceptActivated {
                concept_id: next.concept_id.clone(),
                cursor_index: self.state.cursor_index(),
            }),
            (Resolution::CaughtUp, ConceptSlot::CaughtUp) => None,
            (Resolution::CaughtUp, _) => Some(SessionEvent::CaughtUp),
            (Resolution::NotAvailable, ConceptSlot::NotAvailable) => None,
            (Resolution::NotAvailable, _) => Some(SessionEvent::NotAvailable {
                concept_id: self.resolver.focus().unwrap_or_default().to_string(),
            }),
        };

        self.state.set_resolution(resolution);
        if let Some(event) = event {
            self.events.emit(event);
        }
    }

    // ========================================================================
    // 只读访问
    // ========================================================================

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> SessionMode {
        self.state.mode()
    }

    pub fn scope_key(&self) -> &ScopeKey {
        self.state.scope_key()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn head(&self) -> Option<&Drill> {
        self.state.head()
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    pub fn frontier(&self) -> &ConceptFrontier {
        &self.frontier
    }

    pub fn frontier_error(&self) -> Option<&str> {
        self.frontier_error.as_deref()
    }

    pub fn last_outcome(&self) -> Option<&ReviewOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        self.state.summary()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            summary: self.state.summary(),
            due_count: self.frontier.due_count(),
            frontier_error: self.frontier_error.clone(),
            last_outcome: self.last_outcome.clone(),
            head: self.state.head().cloned(),
        }
    }
}
