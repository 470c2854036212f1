//! 练习队列统一错误类型
//!
//! 提供练习队列引擎专用的错误处理机制。

use serde::Serialize;
use thiserror::Error;

/// 练习队列统一错误类型
#[derive(Debug, Clone, Error, Serialize)]
pub enum PracticeError {
    /// 当前没有可作答的题目（队首为空）
    #[error("No active question")]
    NoActiveQuestion,

    /// 无效输入（评分越界、耗时为 0 等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 网络错误（连接失败、超时）
    #[error("Network error: {0}")]
    Network(String),

    /// 远端返回非 2xx 状态码
    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 题目生成失败
    #[error("Generation failed: {0}")]
    Generation(String),

    /// 复习提交失败
    #[error("Submission failed: {0}")]
    Submission(String),

    /// 响应到达时作用域已切换，结果被丢弃
    #[error("Stale response for scope {0}")]
    StaleResponse(String),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl PracticeError {
    /// 前端按 code 差异化处理
    pub fn code(&self) -> &'static str {
        match self {
            PracticeError::NoActiveQuestion => "NO_ACTIVE_QUESTION",
            PracticeError::InvalidInput(_) => "INVALID_INPUT",
            PracticeError::Network(_) => "NETWORK_ERROR",
            PracticeError::Http { .. } => "HTTP_ERROR",
            PracticeError::Serialization(_) => "SERIALIZATION_ERROR",
            PracticeError::Configuration(_) => "CONFIGURATION_ERROR",
            PracticeError::Generation(_) => "GENERATION_ERROR",
            PracticeError::Submission(_) => "SUBMISSION_ERROR",
            PracticeError::StaleResponse(_) => "STALE_RESPONSE",
            PracticeError::Other(_) => "OTHER",
        }
    }

    /// 是否为可重试的瞬时错误（网络错误、5xx、429）
    pub fn is_transient(&self) -> bool {
        match self {
            PracticeError::Network(_) => true,
            PracticeError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// 从 serde_json::Error 转换
impl From<serde_json::Error> for PracticeError {
    fn from(e: serde_json::Error) -> Self {
        PracticeError::Serialization(e.to_string())
    }
}

// 从 reqwest::Error 转换：解码失败归为序列化错误，其余视为网络错误
impl From<reqwest::Error> for PracticeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PracticeError::Serialization(e.to_string())
        } else if let Some(status) = e.status() {
            PracticeError::Http {
                status: status.as_u16(),
                endpoint: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
                message: e.to_string(),
            }
        } else {
            PracticeError::Network(e.to_string())
        }
    }
}

// 从 anyhow::Error 转换
impl From<anyhow::Error> for PracticeError {
    fn from(e: anyhow::Error) -> Self {
        PracticeError::Other(format!("{:#}", e))
    }
}

// 宿主边界：序列化为结构化 JSON
impl From<PracticeError> for String {
    fn from(e: PracticeError) -> Self {
        let code = e.code();
        let message = e.to_string();
        serde_json::json!({ "code": code, "message": message }).to_string()
    }
}

/// Result 类型别名
pub type PracticeResult<T> = Result<T, PracticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(PracticeError::NoActiveQuestion.to_string(), "No active question");

        let err = PracticeError::Http {
            status: 503,
            endpoint: "/practice/drills".to_string(),
            message: "unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503 from /practice/drills: unavailable"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(PracticeError::Network("reset".into()).is_transient());
        let throttled = PracticeError::Http {
            status: 429,
            endpoint: String::new(),
            message: String::new(),
        };
        assert!(throttled.is_transient());
        let not_found = PracticeError::Http {
            status: 404,
            endpoint: String::new(),
            message: String::new(),
        };
        assert!(!not_found.is_transient());
        assert!(!PracticeError::NoActiveQuestion.is_transient());
    }

    #[test]
    fn test_error_to_string_conversion() {
        let s: String = PracticeError::InvalidInput("rating out of range".into()).into();
        let value: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(value["code"], "INVALID_INPUT");
        assert_eq!(value["message"], "Invalid input: rating out of range");
    }
}
