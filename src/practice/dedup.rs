//! 题目去重键
//!
//! 去重键 = 概念 ID + 结构签名 + 归一化题干。
//! 归一化：转小写、数字串替换为占位符、折叠空白，使仅参数不同的题目发生碰撞。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// 数字串占位符
pub const DIGIT_PLACEHOLDER: &str = "#";

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// 归一化题干
pub fn normalize_question(question: &str) -> String {
    let lowered = question.to_lowercase();
    let replaced = DIGIT_RUN.replace_all(&lowered, DIGIT_PLACEHOLDER);
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 去重键（派生值，不单独存储于题目上）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(concept_id: &str, structure_signature: &str, question: &str) -> Self {
        DedupKey(format!(
            "{}\u{1f}{}\u{1f}{}",
            concept_id,
            structure_signature,
            normalize_question(question)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
