//! 日志初始化
//!
//! 使用 `tracing_subscriber::fmt` + `EnvFilter`，`RUST_LOG` 优先于默认指令。
//! 重复调用安全：已有全局 subscriber 时直接返回。

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 默认日志级别
pub const DEFAULT_DIRECTIVE: &str = "info";

/// 构建过滤器：`RUST_LOG` 未设置或无法解析时回落到 `default_directive`
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(default_directive)
    })
}

/// 安装全局 subscriber；返回是否由本次调用完成安装
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_tracing(DEFAULT_DIRECTIVE);
        assert!(!init_tracing("debug"));
    }
}
