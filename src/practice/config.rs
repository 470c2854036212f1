//! 练习队列配置
//!
//! 加载顺序（后者覆盖前者）：
//! 1. 内置默认值
//! 2. 可选的 TOML 配置文件
//! 3. `PRACTICE__*` 环境变量（`.env` 由 dotenvy 预先载入）

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{PracticeError, PracticeResult};
use super::mode::SessionMode;

/// 默认配置文件路径（不含扩展名）
pub const DEFAULT_CONFIG_FILE: &str = "config/practice";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PRACTICE";

/// 补题策略：队列长度 <= 阈值时补题，每次请求 batch_size 道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillPolicy {
    pub refill_threshold: usize,
    pub batch_size: usize,
}

impl RefillPolicy {
    /// 计划模式：逐题按需请求
    pub const SCHEDULED: RefillPolicy = RefillPolicy {
        refill_threshold: 0,
        batch_size: 1,
    };

    /// 专注模式：提前预取
    pub const FOCUSED: RefillPolicy = RefillPolicy {
        refill_threshold: 2,
        batch_size: 4,
    };
}

/// 练习队列配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    /// 后端 API 根地址
    pub api_base_url: String,
    /// Bearer token（可选）
    pub api_token: Option<String>,
    /// 单次请求超时
    pub request_timeout_ms: u64,
    /// 概念前沿缓存有效期
    pub frontier_cache_ttl_secs: u64,
    /// 概念前沿拉取的最大尝试次数（含首次）
    pub frontier_retry_attempts: usize,
    /// 概念前沿重试的初始退避
    pub frontier_retry_initial_delay_ms: u64,
    /// 计划模式的作用域标签
    pub session_tag: String,
    pub scheduled: RefillPolicy,
    pub focused: RefillPolicy,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            api_token: None,
            request_timeout_ms: 15_000,
            frontier_cache_ttl_secs: 30,
            frontier_retry_attempts: 3,
            frontier_retry_initial_delay_ms: 200,
            session_tag: "scheduled".to_string(),
            scheduled: RefillPolicy::SCHEDULED,
            focused: RefillPolicy::FOCUSED,
        }
    }
}

impl PracticeConfig {
    /// 从 `.env`、配置文件与环境变量加载
    ///
    /// `path` 为空时尝试 [`DEFAULT_CONFIG_FILE`]，文件不存在则跳过。
    pub fn from_env_and_file(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(config::File::from(p).required(true));
            }
            None => {
                builder = builder
                    .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded = builder.build().context("Failed to build practice config")?;
        let cfg: PracticeConfig = loaded
            .try_deserialize()
            .context("Failed to deserialize practice config")?;
        cfg.validate()
            .map_err(|e| anyhow::anyhow!("Invalid practice config: {}", e))?;
        Ok(cfg)
    }

    /// 验证配置是否完整
    pub fn validate(&self) -> PracticeResult<()> {
        url::Url::parse(self.api_base_url.trim()).map_err(|e| {
            PracticeError::Configuration(format!(
                "invalid api_base_url {}: {}",
                self.api_base_url, e
            ))
        })?;
        if self.session_tag.trim().is_empty() {
            return Err(PracticeError::Configuration("session_tag 不能为空".into()));
        }
        if self.scheduled.batch_size == 0 || self.focused.batch_size == 0 {
            return Err(PracticeError::Configuration("batch_size 必须大于 0".into()));
        }
        if self.frontier_cache_ttl_secs == 0 {
            return Err(PracticeError::Configuration(
                "frontier_cache_ttl_secs 必须大于 0".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(PracticeError::Configuration("request_timeout_ms 必须大于 0".into()));
        }
        Ok(())
    }

    pub fn policy_for(&self, mode: SessionMode) -> RefillPolicy {
        match mode {
            SessionMode::Scheduled => self.scheduled,
            SessionMode::Focused => self.focused,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn frontier_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.frontier_cache_ttl_secs)
    }
}
