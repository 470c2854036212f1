//! 会话模式解析
//!
//! - 外部给出专注概念 ID → 专注模式，在到期/前沿/即将到期三者并集中查找该概念
//! - 否则 → 计划模式，按游标遍历到期列表
//!
//! 作用域键：专注模式为概念 ID 本身；计划模式为固定的会话标签，
//! 游标推进不改变作用域键。

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::types::{Concept, ConceptFrontier};

/// 会话模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// 遍历全部到期概念
    Scheduled,
    /// 固定单个概念
    Focused,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Scheduled => write!(f, "scheduled"),
            SessionMode::Focused => write!(f, "focused"),
        }
    }
}

/// 作用域键："队列当前服务于什么"，变化即全量重置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        ScopeKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 活跃概念的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 有可练习的概念
    Active(Concept),
    /// 计划模式下游标越过到期列表（终态）
    CaughtUp,
    /// 专注模式下找不到指定概念（终态，不启动队列）
    NotAvailable,
}

impl Resolution {
    pub fn concept(&self) -> Option<&Concept> {
        match self {
            Resolution::Active(c) => Some(c),
            _ => None,
        }
    }
}

/// 会话模式解析器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeResolver {
    focus: Option<String>,
    session_tag: String,
}

impl ModeResolver {
    /// 空白的专注 ID 视为未指定
    pub fn new(focus: Option<&str>, session_tag: impl Into<String>) -> Self {
        Self {
            focus: focus
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from),
            session_tag: session_tag.into(),
        }
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn mode(&self) -> SessionMode {
        if self.focus.is_some() {
            SessionMode::Focused
        } else {
            SessionMode::Scheduled
        }
    }

    pub fn scope_key(&self) -> ScopeKey {
        match &self.focus {
            Some(id) => ScopeKey::new(id.clone()),
            None => ScopeKey::new(self.session_tag.clone()),
        }
    }

    /// 解析活跃概念；游标仅在计划模式下生效
    pub fn resolve(&self, frontier: &ConceptFrontier, cursor_index: usize) -> Resolution {
        let resolution = match &self.focus {
            Some(id) => frontier
                .find(id)
                .cloned()
                .map(Resolution::Active)
                .unwrap_or(Resolution::NotAvailable),
            None => frontier
                .due_for_review
                .get(cursor_index)
                .cloned()
                .map(Resolution::Active)
                .unwrap_or(Resolution::CaughtUp),
        };

        debug!(
            "[ModeResolver] mode={}, cursor={}, resolved={:?}",
            self.mode(),
            cursor_index,
            resolution.concept().map(|c| c.concept_id.as_str())
        );

        resolution
    }
}
