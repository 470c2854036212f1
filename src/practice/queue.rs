//! 练习题队列状态机
//!
//! 每个会话持有一个 `QueueState`，维护当前活跃概念的有序、去重、预取的题目队列。
//!
//! ## 补题策略
//! 每次队列或作用域发生变化时调用 [`QueueState::on_queue_changed`]：
//! - 无活跃概念 → 无动作
//! - 有请求在途 → 无动作（同一概念同一时刻最多一个出题请求）
//! - 已耗尽 → 计划模式且队列已空时推进游标，否则无动作
//! - 空闲且 `队列长度 <= 阈值` → 发出 `Generate` 命令
//!
//! ## 过期响应
//! 每个出题请求携带 [`GenerationTicket`]（作用域键 + 概念 ID + 请求序号），
//! 响应到达时与当前状态比对，不匹配即丢弃。

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::config::RefillPolicy;
use super::dedup::DedupKey;
use super::error::PracticeResult;
use super::mode::{Resolution, ScopeKey, SessionMode};
use super::types::{normalize_drill, Concept, Drill, DrillBatch, DrillRequest};

// ============================================================================
// 状态类型
// ============================================================================

/// 出题请求凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub scope_key: ScopeKey,
    pub request_id: u64,
    pub request: DrillRequest,
}

impl GenerationTicket {
    pub fn concept_id(&self) -> &str {
        &self.request.concept_id
    }
}

/// 出题状态（替代在途/耗尽两个布尔标志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    InFlight { request_id: u64 },
    /// 当前作用域内该概念不再有新题
    Exhausted,
}

/// 活跃概念槽位
#[derive(Debug, Clone, PartialEq)]
pub enum ConceptSlot {
    /// 尚未解析
    Pending,
    Active(Concept),
    /// 计划模式游标已推进，等待重新解析
    Advancing,
    CaughtUp,
    NotAvailable,
}

/// 状态机对外发出的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    /// 向出题服务请求题目
    Generate(GenerationTicket),
    /// 计划模式：概念耗尽且队列已空，游标已推进，需要重新解析活跃概念
    AdvanceCursor { cursor_index: usize },
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// 无活跃概念
    Empty,
    /// 队列为空，正在出题
    Filling,
    /// 队首可作答
    Ready,
    /// 队首已消费，等待补题或推进
    Draining,
    /// 概念已耗尽且队列为空
    Exhausted,
    /// 游标推进中（仅计划模式）
    Advancing,
    /// 到期概念全部完成（仅计划模式）
    CaughtUp,
    /// 专注的概念不存在（仅专注模式）
    NotAvailable,
}

/// 出题响应的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationApplied {
    /// 追加了新题
    Appended {
        accepted: usize,
        invalid: usize,
        duplicates: usize,
    },
    /// 没有任何新题，概念标记为耗尽
    Exhausted { invalid: usize, duplicates: usize },
    /// 请求失败，可在下一次自然触发时重试
    Failed { error: String },
    /// 作用域已变化，响应被丢弃
    Stale,
}

/// 会话摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub queue_length: usize,
    pub completed_count: u32,
    pub is_generating: bool,
    pub generation_error: Option<String>,
    pub submission_error: Option<String>,
    pub mode: SessionMode,
    pub scope_key: String,
    pub active_concept_id: Option<String>,
    pub cursor_index: usize,
    pub no_more_items: bool,
    pub phase: SessionPhase,
}

// ============================================================================
// 队列状态机
// ============================================================================

/// 单个会话的队列状态
///
/// 队列、去重集合与出题状态只由本结构体修改，不跨会话共享。
#[derive(Debug, Clone, PartialEq)]
pub struct QueueState {
    pub(super) mode: SessionMode,
    pub(super) scope_key: ScopeKey,
    pub(super) policy: RefillPolicy,
    pub(super) slot: ConceptSlot,
    pub(super) cursor_index: usize,
    pub(super) completed_count: u32,
    pub(super) drills: VecDeque<Drill>,
    pub(super) seen_keys: HashSet<DedupKey>,
    pub(super) generation: GenerationState,
    pub(super) generation_error: Option<String>,
    pub(super) submission_error: Option<String>,
    /// 单调递增，重置时不回退，保证旧凭据不会与新请求撞号
    next_request_id: u64,
}

impl QueueState {
    pub fn new(mode: SessionMode, scope_key: ScopeKey, policy: RefillPolicy) -> Self {
        Self {
            mode,
            scope_key,
            policy,
            slot: ConceptSlot::Pending,
            cursor_index: 0,
            completed_count: 0,
            drills: VecDeque::new(),
            seen_keys: HashSet::new(),
            generation: GenerationState::Idle,
            generation_error: None,
            submission_error: None,
            next_request_id: 1,
        }
    }

    /// 全量重置（作用域变化时）
    ///
    /// 清空队列、去重集合、耗尽标志、游标与计数；在途请求随之失效。
    /// 连续以相同参数调用两次与调用一次结果相同。
    pub fn reset_scope(&mut self, mode: SessionMode, scope_key: ScopeKey, policy: RefillPolicy) {
        if self.scope_key != scope_key {
            info!(
                "[PracticeQueue] Scope reset: {} -> {} (mode={})",
                self.scope_key, scope_key, mode
            );
        }
        let next_request_id = self.next_request_id;
        *self = Self::new(mode, scope_key, policy);
        self.next_request_id = next_request_id;
    }

    /// 写入活跃概念的解析结果
    ///
    /// 概念 ID 不变时只刷新概念元数据；否则清空队列并复位出题状态。
    /// 去重集合在整个作用域生命周期内保留。
    pub fn set_resolution(&mut self, resolution: Resolution) {
        if let (ConceptSlot::Active(current), Resolution::Active(next)) =
            (&self.slot, &resolution)
        {
            if current.concept_id == next.concept_id {
                self.slot = ConceptSlot::Active(next.clone());
                return;
            }
        }

        self.drills.clear();
        self.generation = GenerationState::Idle;
        self.generation_error = None;
        self.submission_error = None;
        self.slot = match resolution {
            Resolution::Active(concept) => {
                info!(
                    "[PracticeQueue] Active concept: {} (scope={}, cursor={})",
                    concept.concept_id, self.scope_key, self.cursor_index
                );
                ConceptSlot::Active(concept)
            }
            Resolution::CaughtUp => {
                info!(
                    "[PracticeQueue] Caught up: cursor={} (scope={})",
                    self.cursor_index, self.scope_key
                );
                ConceptSlot::CaughtUp
            }
            Resolution::NotAvailable => {
                warn!(
                    "[PracticeQueue] Focused concept not available (scope={})",
                    self.scope_key
                );
                ConceptSlot::NotAvailable
            }
        };
    }

    /// 补题/推进策略，纯状态转换
    pub fn on_queue_changed(&mut self) -> Option<QueueCommand> {
        let concept_id = match &self.slot {
            ConceptSlot::Active(c) => c.concept_id.clone(),
            _ => return None,
        };

        match self.generation {
            GenerationState::InFlight { .. } => None,
            GenerationState::Exhausted => {
                if self.mode == SessionMode::Scheduled && self.drills.is_empty() {
                    self.cursor_index += 1;
                    self.slot = ConceptSlot::Advancing;
                    info!(
                        "[PracticeQueue] Concept {} exhausted, advancing cursor to {}",
                        concept_id, self.cursor_index
                    );
                    Some(QueueCommand::AdvanceCursor {
                        cursor_index: self.cursor_index,
                    })
                } else {
                    None
                }
            }
            GenerationState::Idle => {
                if self.drills.len() > self.policy.refill_threshold {
                    return None;
                }
                let request_id = self.next_request_id;
                self.next_request_id += 1;
                self.generation = GenerationState::InFlight { request_id };
                debug!(
                    "[PracticeQueue] Requesting {} drills for {} (request_id={}, queue_len={})",
                    self.policy.batch_size,
                    concept_id,
                    request_id,
                    self.drills.len()
                );
                Some(QueueCommand::Generate(GenerationTicket {
                    scope_key: self.scope_key.clone(),
                    request_id,
                    request: DrillRequest {
                        concept_id,
                        count: self.policy.batch_size,
                    },
                }))
            }
        }
    }

    /// 凭据是否仍对应当前在途请求
    pub fn is_current(&self, ticket: &GenerationTicket) -> bool {
        self.scope_key == ticket.scope_key
            && self.active_concept_id() == Some(ticket.concept_id())
            && self.generation
                == GenerationState::InFlight {
                    request_id: ticket.request_id,
                }
    }

    /// 处理出题响应：归一化 → 丢弃无效 → 去重 → 追加
    pub fn apply_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: PracticeResult<DrillBatch>,
    ) -> GenerationApplied {
        if !self.is_current(ticket) {
            debug!(
                "[PracticeQueue] Dropping stale generation response: scope={}, concept={}, request_id={}",
                ticket.scope_key,
                ticket.concept_id(),
                ticket.request_id
            );
            return GenerationApplied::Stale;
        }

        let concept = match &self.slot {
            ConceptSlot::Active(c) => c.clone(),
            _ => return GenerationApplied::Stale,
        };

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    "[PracticeQueue] Generation failed for {}: {}",
                    concept.concept_id, e
                );
                let error = e.to_string();
                self.generation = GenerationState::Idle;
                self.generation_error = Some(error.clone());
                return GenerationApplied::Failed { error };
            }
        };

        let mut accepted = 0usize;
        let mut invalid = 0usize;
        let mut duplicates = 0usize;

        for raw in &batch.drills {
            let Some(drill) = normalize_drill(raw, &concept) else {
                invalid += 1;
                continue;
            };
            if self.seen_keys.insert(drill.dedup_key()) {
                self.drills.push_back(drill);
                accepted += 1;
            } else {
                duplicates += 1;
            }
        }

        self.generation_error = None;

        if accepted == 0 {
            self.generation = GenerationState::Exhausted;
            info!(
                "[PracticeQueue] No novel drills for {} (raw={}, invalid={}, duplicates={}), marking exhausted",
                concept.concept_id,
                batch.drills.len(),
                invalid,
                duplicates
            );
            GenerationApplied::Exhausted {
                invalid,
                duplicates,
            }
        } else {
            self.generation = GenerationState::Idle;
            info!(
                "[PracticeQueue] Appended {} drills for {} (invalid={}, duplicates={}, queue_len={})",
                accepted,
                concept.concept_id,
                invalid,
                duplicates,
                self.drills.len()
            );
            GenerationApplied::Appended {
                accepted,
                invalid,
                duplicates,
            }
        }
    }

    /// 移除队首；空队列时为空操作
    pub fn pop_head(&mut self) -> Option<Drill> {
        self.drills.pop_front()
    }

    // ========================================================================
    // 只读访问
    // ========================================================================

    pub fn head(&self) -> Option<&Drill> {
        self.drills.front()
    }

    pub fn len(&self) -> usize {
        self.drills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drills.is_empty()
    }

    pub fn drills(&self) -> impl Iterator<Item = &Drill> {
        self.drills.iter()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn scope_key(&self) -> &ScopeKey {
        &self.scope_key
    }

    pub fn policy(&self) -> RefillPolicy {
        self.policy
    }

    pub fn slot(&self) -> &ConceptSlot {
        &self.slot
    }

    pub fn active_concept(&self) -> Option<&Concept> {
        match &self.slot {
            ConceptSlot::Active(c) => Some(c),
            _ => None,
        }
    }

    pub fn active_concept_id(&self) -> Option<&str> {
        self.active_concept().map(|c| c.concept_id.as_str())
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn generation(&self) -> GenerationState {
        self.generation
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.generation, GenerationState::InFlight { .. })
    }

    pub fn no_more_items(&self) -> bool {
        self.generation == GenerationState::Exhausted
    }

    pub fn seen_count(&self) -> usize {
        self.seen_keys.len()
    }

    pub fn generation_error(&self) -> Option<&str> {
        self.generation_error.as_deref()
    }

    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.slot {
            ConceptSlot::Pending => SessionPhase::Empty,
            ConceptSlot::Advancing => SessionPhase::Advancing,
            ConceptSlot::CaughtUp => SessionPhase::CaughtUp,
            ConceptSlot::NotAvailable => SessionPhase::NotAvailable,
            ConceptSlot::Active(_) if !self.drills.is_empty() => SessionPhase::Ready,
            ConceptSlot::Active(_) => match self.generation {
                GenerationState::InFlight { .. } => SessionPhase::Filling,
                GenerationState::Exhausted => SessionPhase::Exhausted,
                GenerationState::Idle => SessionPhase::Draining,
            },
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            queue_length: self.drills.len(),
            completed_count: self.completed_count,
            is_generating: self.is_generating(),
            generation_error: self.generation_error.clone(),
            submission_error: self.submission_error.clone(),
            mode: self.mode,
            scope_key: self.scope_key.to_string(),
            active_concept_id: self.active_concept_id().map(String::from),
            cursor_index: self.cursor_index,
            no_more_items: self.no_more_items(),
            phase: self.phase(),
        }
    }
}
