//! 练习队列数据模型
//!
//! 入站记录（概念、题目、复习结果）的字段名历史上有多种写法
//! （`conceptId` / `concept_id` / `id` ……），统一在本模块的归一化边界函数中处理：
//! - `normalize_concept`
//! - `normalize_drill`
//! - `normalize_outcome`
//!
//! 调用方不得在各自的调用点内联解析原始字段。

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::dedup::DedupKey;
use super::error::PracticeError;

// ============================================================================
// 字段名变体
// ============================================================================

const CONCEPT_ID_KEYS: &[&str] = &["conceptId", "concept_id", "id"];
/// 题目记录上的 `id` 是题目自身的 ID，不能当作概念 ID
const DRILL_CONCEPT_ID_KEYS: &[&str] = &["conceptId", "concept_id"];
const LESSON_ID_KEYS: &[&str] = &["lessonId", "lesson_id"];
const TITLE_KEYS: &[&str] = &["title", "name", "conceptTitle", "concept_title", "label"];
const MASTERY_KEYS: &[&str] = &["mastery", "masteryScore", "mastery_score"];
const NEXT_REVIEW_KEYS: &[&str] = &[
    "nextReviewAt",
    "next_review_at",
    "nextReview",
    "dueAt",
    "due_at",
];
const QUESTION_KEYS: &[&str] = &["question", "prompt", "questionText", "question_text"];
const ANSWER_KEYS: &[&str] = &["expectedAnswer", "expected_answer", "answer", "solution"];
const HINT_KEYS: &[&str] = &["hints", "hint"];
const SIGNATURE_KEYS: &[&str] = &[
    "structureSignature",
    "structure_signature",
    "signature",
    "templateId",
    "template_id",
];
const P_CORRECT_KEYS: &[&str] = &[
    "predictedPCorrect",
    "predicted_p_correct",
    "pCorrect",
    "p_correct",
];
const CORE_MODEL_KEYS: &[&str] = &["coreModel", "core_model", "model"];
const EXPOSURE_KEYS: &[&str] = &["exposures", "exposureCount", "exposure_count"];

/// 缺省的预测正确率（远端未给出时）
pub const DEFAULT_PREDICTED_P_CORRECT: f64 = 0.5;

// ============================================================================
// 字段提取辅助
// ============================================================================

fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn pick_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match pick(obj, keys)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pick_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = match pick(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

/// 解析时间戳：RFC 3339 字符串、`YYYY-MM-DD` 日期、或 Unix 时间（秒/毫秒）
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // 大于 1e11 视为毫秒
            if raw.abs() > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

// ============================================================================
// 概念
// ============================================================================

/// 远端调度器跟踪的知识点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub concept_id: String,
    pub lesson_id: Option<String>,
    pub title: String,
    pub mastery: Option<f64>,
    pub next_review_at: Option<DateTime<Utc>>,
}

/// 概念归一化边界：缺少 ID 的记录返回 `None`
pub fn normalize_concept(raw: &Value) -> Option<Concept> {
    let obj = raw.as_object()?;
    let concept_id = pick_string(obj, CONCEPT_ID_KEYS)?;
    let title = pick_string(obj, TITLE_KEYS).unwrap_or_else(|| concept_id.clone());

    Some(Concept {
        lesson_id: pick_string(obj, LESSON_ID_KEYS),
        title,
        mastery: pick_f64(obj, MASTERY_KEYS),
        next_review_at: pick(obj, NEXT_REVIEW_KEYS).and_then(parse_timestamp),
        concept_id,
    })
}

/// 概念前沿服务的原始响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFrontier {
    #[serde(default, alias = "due_for_review", alias = "due")]
    pub due_for_review: Vec<Value>,
    #[serde(default)]
    pub frontier: Vec<Value>,
    #[serde(default, alias = "coming_soon", alias = "upcoming")]
    pub coming_soon: Vec<Value>,
}

/// 归一化后的概念前沿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptFrontier {
    pub due_for_review: Vec<Concept>,
    pub frontier: Vec<Concept>,
    pub coming_soon: Vec<Concept>,
}

impl ConceptFrontier {
    pub fn from_raw(raw: &RawFrontier) -> Self {
        Self {
            due_for_review: normalize_concept_list(&raw.due_for_review),
            frontier: normalize_concept_list(&raw.frontier),
            coming_soon: normalize_concept_list(&raw.coming_soon),
        }
    }

    /// 在三个列表的并集中按 ID 查找（到期 → 前沿 → 即将到期）
    pub fn find(&self, concept_id: &str) -> Option<&Concept> {
        self.due_for_review
            .iter()
            .chain(self.frontier.iter())
            .chain(self.coming_soon.iter())
            .find(|c| c.concept_id == concept_id)
    }

    pub fn due_count(&self) -> usize {
        self.due_for_review.len()
    }
}

/// 列表内按 ID 去重，先出现者保留
fn normalize_concept_list(raw: &[Value]) -> Vec<Concept> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(normalize_concept)
        .filter(|c| seen.insert(c.concept_id.clone()))
        .collect()
}

// ============================================================================
// 题目
// ============================================================================

/// 生成的单道练习题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drill {
    pub concept_id: String,
    pub lesson_id: Option<String>,
    pub question: String,
    pub expected_answer: String,
    pub hints: Vec<String>,
    pub structure_signature: String,
    pub predicted_p_correct: f64,
    pub core_model: String,
}

impl Drill {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.concept_id, &self.structure_signature, &self.question)
    }
}

/// 题目归一化边界
///
/// 题干或参考答案去除空白后为空的题目视为无效，返回 `None`。
/// 题目始终归属于当前活跃概念：记录声明了其他概念 ID 时视为无效；
/// 缺少课程 ID 时回落到所属概念。
pub fn normalize_drill(raw: &Value, concept: &Concept) -> Option<Drill> {
    let obj = raw.as_object()?;
    if let Some(declared) = pick_string(obj, DRILL_CONCEPT_ID_KEYS) {
        if declared != concept.concept_id {
            return None;
        }
    }
    let question = pick_string(obj, QUESTION_KEYS)?;
    let expected_answer = pick_string(obj, ANSWER_KEYS)?;

    let hints = match pick(obj, HINT_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|h| h.as_str())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    let predicted_p_correct = pick_f64(obj, P_CORRECT_KEYS)
        .map(|p| p.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_PREDICTED_P_CORRECT);

    Some(Drill {
        concept_id: concept.concept_id.clone(),
        lesson_id: pick_string(obj, LESSON_ID_KEYS).or_else(|| concept.lesson_id.clone()),
        question,
        expected_answer,
        hints,
        structure_signature: pick_string(obj, SIGNATURE_KEYS).unwrap_or_default(),
        predicted_p_correct,
        core_model: pick_string(obj, CORE_MODEL_KEYS).unwrap_or_default(),
    })
}

/// 出题请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillRequest {
    pub concept_id: String,
    pub count: usize,
}

/// 出题服务的原始响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrillBatch {
    #[serde(default, alias = "items", alias = "questions")]
    pub drills: Vec<Value>,
}

// ============================================================================
// 复习提交
// ============================================================================

/// 复习评分（1..=4）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.as_u8()
    }
}

impl TryFrom<u8> for Rating {
    type Error = PracticeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(PracticeError::InvalidInput(format!(
                "rating must be within 1..=4, got {}",
                other
            ))),
        }
    }
}

/// 提交时回显的题目元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    pub question: String,
    pub structure_signature: String,
    pub predicted_p_correct: f64,
    pub core_model: String,
}

/// 作答类型：评分作答或跳过，提交服务按载荷形状区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attempt", rename_all = "lowercase")]
pub enum Attempt {
    Graded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<Value>,
    },
    Skipped,
}

/// 单条复习提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub concept_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    pub rating: Rating,
    pub review_duration_ms: u64,
    #[serde(flatten)]
    pub attempt: Attempt,
    #[serde(flatten)]
    pub metadata: ReviewMetadata,
}

impl ReviewSubmission {
    pub fn is_skip(&self) -> bool {
        matches!(self.attempt, Attempt::Skipped)
    }
}

/// 调度器返回的复习结果（仅展示，不在本地计算）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub concept_id: String,
    pub mastery: Option<f64>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub exposures: Option<u32>,
}

/// 复习结果归一化边界
pub fn normalize_outcome(raw: &Value) -> Option<ReviewOutcome> {
    let obj = raw.as_object()?;
    Some(ReviewOutcome {
        concept_id: pick_string(obj, CONCEPT_ID_KEYS)?,
        mastery: pick_f64(obj, MASTERY_KEYS),
        next_review_at: pick(obj, NEXT_REVIEW_KEYS).and_then(parse_timestamp),
        exposures: pick_f64(obj, EXPOSURE_KEYS)
            .filter(|e| *e >= 0.0)
            .map(|e| e.round() as u32),
    })
}

/// 提交服务的原始响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewBatchResponse {
    #[serde(default, alias = "results")]
    pub outcomes: Vec<Value>,
}

impl ReviewBatchResponse {
    pub fn normalized(&self) -> Vec<ReviewOutcome> {
        self.outcomes.iter().filter_map(normalize_outcome).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concept(id: &str) -> Concept {
        Concept {
            concept_id: id.to_string(),
            lesson_id: Some("lesson-1".to_string()),
            title: id.to_string(),
            mastery: None,
            next_review_at: None,
        }
    }

    #[test]
    fn test_concept_field_variants() {
        let a = normalize_concept(&json!({"conceptId": "c1", "title": "Limits"})).unwrap();
        let b = normalize_concept(&json!({"concept_id": "c1", "name": "Limits"})).unwrap();
        let c = normalize_concept(&json!({"id": "c1", "label": "Limits"})).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_concept_without_id_is_dropped() {
        assert!(normalize_concept(&json!({"title": "orphan"})).is_none());
        assert!(normalize_concept(&json!({"conceptId": "   "})).is_none());
        assert!(normalize_concept(&json!("not an object")).is_none());
    }

    #[test]
    fn test_concept_numeric_id_and_timestamps() {
        let c = normalize_concept(&json!({
            "id": 42,
            "mastery_score": "0.75",
            "next_review_at": "2026-03-01T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(c.concept_id, "42");
        assert_eq!(c.title, "42");
        assert_eq!(c.mastery, Some(0.75));
        assert_eq!(c.next_review_at.unwrap().to_rfc3339(), "2026-03-01T08:00:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let millis = parse_timestamp(&json!(1_700_000_000_000i64)).unwrap();
        let secs = parse_timestamp(&json!(1_700_000_000i64)).unwrap();
        assert_eq!(millis, secs);
        assert!(parse_timestamp(&json!("2026-01-02")).is_some());
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_frontier_union_lookup_and_dedup() {
        let raw: RawFrontier = serde_json::from_value(json!({
            "due_for_review": [{"id": "a"}, {"id": "a"}, {"title": "no id"}],
            "frontier": [{"conceptId": "b"}],
            "upcoming": [{"concept_id": "c"}]
        }))
        .unwrap();
        let frontier = ConceptFrontier::from_raw(&raw);
        assert_eq!(frontier.due_count(), 1);
        assert!(frontier.find("b").is_some());
        assert!(frontier.find("c").is_some());
        assert!(frontier.find("z").is_none());
    }

    #[test]
    fn test_drill_normalization_and_fallbacks() {
        let drill = normalize_drill(
            &json!({
                "prompt": "  What is 2+2? ",
                "answer": "4",
                "hint": "count",
                "signature": "arith.add",
                "p_correct": 1.7,
                "model": "m1"
            }),
            &concept("c1"),
        )
        .unwrap();
        assert_eq!(drill.concept_id, "c1");
        assert_eq!(drill.lesson_id.as_deref(), Some("lesson-1"));
        assert_eq!(drill.question, "What is 2+2?");
        assert_eq!(drill.hints, vec!["count".to_string()]);
        assert_eq!(drill.predicted_p_correct, 1.0);
        assert_eq!(drill.core_model, "m1");
    }

    #[test]
    fn test_drill_own_id_is_not_concept_id() {
        let c = concept("C");
        let first = normalize_drill(
            &json!({"id": "drill-1", "question": "Add 2 and 3", "expectedAnswer": "5",
                    "structureSignature": "add"}),
            &c,
        )
        .unwrap();
        let second = normalize_drill(
            &json!({"id": "drill-2", "question": "Add 2 and 3", "expectedAnswer": "5",
                    "structureSignature": "add"}),
            &c,
        )
        .unwrap();
        assert_eq!(first.concept_id, "C");
        assert_eq!(second.concept_id, "C");
        assert_eq!(first.dedup_key(), second.dedup_key());
    }

    #[test]
    fn test_drill_for_other_concept_is_invalid() {
        let c = concept("C");
        let foreign = json!({"conceptId": "X", "question": "q", "expectedAnswer": "a"});
        assert!(normalize_drill(&foreign, &c).is_none());

        let own = json!({
            "concept_id": "C",
            "lessonId": "L9",
            "question": "q",
            "expectedAnswer": "a"
        });
        let drill = normalize_drill(&own, &c).unwrap();
        assert_eq!(drill.concept_id, "C");
        assert_eq!(drill.lesson_id.as_deref(), Some("L9"));
    }

    #[test]
    fn test_drill_missing_question_or_answer_is_invalid() {
        let c = concept("c1");
        assert!(normalize_drill(&json!({"question": " ", "expectedAnswer": "x"}), &c).is_none());
        assert!(normalize_drill(&json!({"question": "q", "expectedAnswer": ""}), &c).is_none());
        let d = normalize_drill(&json!({"question": "q", "expectedAnswer": "a"}), &c).unwrap();
        assert_eq!(d.predicted_p_correct, DEFAULT_PREDICTED_P_CORRECT);
        assert!(d.structure_signature.is_empty());
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(Rating::try_from(1).unwrap(), Rating::Again);
        assert_eq!(Rating::try_from(4).unwrap(), Rating::Easy);
        assert!(Rating::try_from(0).is_err());
        assert!(Rating::try_from(5).is_err());
        assert_eq!(serde_json::to_value(Rating::Good).unwrap(), json!(3));
    }

    #[test]
    fn test_submission_wire_shape() {
        let submission = ReviewSubmission {
            concept_id: "c1".into(),
            lesson_id: None,
            rating: Rating::Hard,
            review_duration_ms: 1200,
            attempt: Attempt::Skipped,
            metadata: ReviewMetadata {
                question: "q".into(),
                structure_signature: "s".into(),
                predicted_p_correct: 0.4,
                core_model: "m".into(),
            },
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["conceptId"], "c1");
        assert_eq!(value["rating"], 2);
        assert_eq!(value["reviewDurationMs"], 1200);
        assert_eq!(value["attempt"], "skipped");
        assert_eq!(value["structureSignature"], "s");
        assert!(value.get("lessonId").is_none());
        assert!(submission.is_skip());
    }

    #[test]
    fn test_outcome_normalization() {
        let response: ReviewBatchResponse = serde_json::from_value(json!({
            "outcomes": [
                {"concept_id": "c1", "mastery": 0.8, "nextReviewAt": "2026-05-01", "exposures": 3},
                {"mastery": 0.1}
            ]
        }))
        .unwrap();
        let outcomes = response.normalized();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].exposures, Some(3));
        assert!(outcomes[0].next_review_at.is_some());
    }
}
