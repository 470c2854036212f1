//! 外部协作服务客户端
//!
//! ## 组成
//! - `traits`: 概念前沿、出题、复习提交三个异步 trait
//! - `http`: 基于 reqwest 的实现
//! - `cache`: 概念前沿 TTL 缓存（moka）
//!
//! ## 使用示例
//! ```rust,ignore
//! let config = PracticeConfig::from_env_and_file(None)?;
//! let http = Arc::new(HttpPracticeClient::new(&config)?);
//! let frontier = CachedFrontierClient::new(http.clone(), config.frontier_cache_ttl());
//! ```

mod cache;
mod http;
mod traits;

pub use cache::CachedFrontierClient;
pub use http::{HttpPracticeClient, DRILLS_PATH, FRONTIER_PATH, REVIEWS_PATH};
pub use traits::{ConceptFrontierClient, DrillGeneratorClient, ReviewSubmissionClient};
