//! 复习提交流水线
//!
//! 只对当前队首题目评分或跳过：
//! 1. `prepare_grade` / `prepare_skip` 基于队首构建提交与凭据（队首为空 → `NoActiveQuestion`）
//! 2. 宿主调用提交服务
//! 3. 成功 → `complete_submission`：移除队首、完成计数 +1、计划模式游标 +1，三者在一次同步转换内完成
//! 4. 失败 → `fail_submission`：队列不变，记录错误，同一题可重试

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::dedup::DedupKey;
use super::error::{PracticeError, PracticeResult};
use super::mode::{ScopeKey, SessionMode};
use super::queue::{ConceptSlot, QueueState};
use super::types::{Attempt, Drill, Rating, ReviewMetadata, ReviewSubmission};

/// 跳过时上报的评分
pub const SKIP_RATING: Rating = Rating::Again;

/// 最小作答耗时（毫秒），提交要求严格大于 0
pub const MIN_REVIEW_DURATION_MS: u64 = 1;

/// 调用方提供的评分输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeInput {
    pub rating: Rating,
    pub review_duration_ms: u64,
    #[serde(default)]
    pub answer: Option<Value>,
}

/// 提交凭据：绑定发起时的作用域与队首题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub scope_key: ScopeKey,
    pub concept_id: String,
    pub lesson_id: Option<String>,
    pub drill_key: DedupKey,
}

/// 提交成功后的状态转换结果
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub drill: Drill,
    pub completed_count: u32,
    /// 计划模式下推进后的游标
    pub advanced_cursor_to: Option<usize>,
}

impl QueueState {
    /// 基于队首构建评分提交
    pub fn prepare_grade(
        &self,
        input: GradeInput,
    ) -> PracticeResult<(SubmissionTicket, ReviewSubmission)> {
        self.prepare(
            input.rating,
            input.review_duration_ms,
            Attempt::Graded {
                answer: input.answer,
            },
        )
    }

    /// 基于队首构建跳过提交
    pub fn prepare_skip(
        &self,
        review_duration_ms: u64,
    ) -> PracticeResult<(SubmissionTicket, ReviewSubmission)> {
        self.prepare(SKIP_RATING, review_duration_ms, Attempt::Skipped)
    }

    fn prepare(
        &self,
        rating: Rating,
        review_duration_ms: u64,
        attempt: Attempt,
    ) -> PracticeResult<(SubmissionTicket, ReviewSubmission)> {
        let head = self.head().ok_or(PracticeError::NoActiveQuestion)?;

        let ticket = SubmissionTicket {
            scope_key: self.scope_key.clone(),
            concept_id: head.concept_id.clone(),
            lesson_id: head.lesson_id.clone(),
            drill_key: head.dedup_key(),
        };

        let submission = ReviewSubmission {
            concept_id: head.concept_id.clone(),
            lesson_id: head.lesson_id.clone(),
            rating,
            review_duration_ms: review_duration_ms.max(MIN_REVIEW_DURATION_MS),
            attempt,
            metadata: ReviewMetadata {
                question: head.question.clone(),
                structure_signature: head.structure_signature.clone(),
                predicted_p_correct: head.predicted_p_correct,
                core_model: head.core_model.clone(),
            },
        };

        Ok((ticket, submission))
    }

    /// 凭据是否仍指向当前作用域的队首
    pub fn is_current_submission(&self, ticket: &SubmissionTicket) -> bool {
        self.scope_key == ticket.scope_key
            && self
                .head()
                .map(|h| h.dedup_key() == ticket.drill_key)
                .unwrap_or(false)
    }

    /// 提交成功：移除队首、计数 +1、计划模式推进游标
    pub fn complete_submission(&mut self, ticket: &SubmissionTicket) -> PracticeResult<Completion> {
        if !self.is_current_submission(ticket) {
            return Err(PracticeError::StaleResponse(ticket.scope_key.to_string()));
        }
        let drill = self.pop_head().ok_or(PracticeError::NoActiveQuestion)?;

        self.completed_count += 1;
        self.submission_error = None;

        let advanced_cursor_to = if self.mode == SessionMode::Scheduled {
            self.cursor_index += 1;
            self.slot = ConceptSlot::Advancing;
            Some(self.cursor_index)
        } else {
            None
        };

        info!(
            "[ReviewPipeline] Completed drill for {} (completed={}, queue_len={}, cursor={:?})",
            drill.concept_id,
            self.completed_count,
            self.len(),
            advanced_cursor_to
        );

        Ok(Completion {
            drill,
            completed_count: self.completed_count,
            advanced_cursor_to,
        })
    }

    /// 提交失败：保留队首，记录错误；凭据过期时返回 false 且不改动状态
    pub fn fail_submission(&mut self, ticket: &SubmissionTicket, err: &PracticeError) -> bool {
        error!(
            concept_id = %ticket.concept_id,
            lesson_id = ticket.lesson_id.as_deref().unwrap_or("-"),
            "[ReviewPipeline] Review submission failed: {}",
            err
        );
        if self.scope_key != ticket.scope_key {
            return false;
        }
        self.submission_error = Some(err.to_string());
        true
    }
}
