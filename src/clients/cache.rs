//! 概念前沿缓存
//!
//! 会话挂载时拉取一次概念前沿，结果缓存约 30 秒；并发的首次拉取只发出一个请求。

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::ConceptFrontierClient;
use crate::practice::error::PracticeResult;
use crate::practice::types::RawFrontier;

/// 带 TTL 缓存的概念前沿客户端
pub struct CachedFrontierClient {
    inner: Arc<dyn ConceptFrontierClient>,
    cache: Cache<(), Arc<RawFrontier>>,
}

impl CachedFrontierClient {
    pub fn new(inner: Arc<dyn ConceptFrontierClient>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl ConceptFrontierClient for CachedFrontierClient {
    async fn fetch_concept_frontier(&self) -> PracticeResult<RawFrontier> {
        let inner = Arc::clone(&self.inner);
        let cached = self
            .cache
            .try_get_with((), async move {
                debug!("[FrontierCache] Miss, fetching from upstream");
                inner.fetch_concept_frontier().await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())?;
        Ok((*cached).clone())
    }

    /// 丢弃缓存，下一次拉取强制访问远端
    async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
        debug!("[FrontierCache] Invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::error::PracticeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFrontier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ConceptFrontierClient for CountingFrontier {
        async fn fetch_concept_frontier(&self) -> PracticeResult<RawFrontier> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PracticeError::Network("down".into()));
            }
            Ok(RawFrontier {
                due_for_review: vec![serde_json::json!({"id": "a"})],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let upstream = Arc::new(CountingFrontier {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cached = CachedFrontierClient::new(upstream.clone(), Duration::from_secs(30));

        let first = cached.fetch_concept_frontier().await.unwrap();
        let second = cached.fetch_concept_frontier().await.unwrap();
        assert_eq!(first.due_for_review, second.due_for_review);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

        cached.invalidate().await;
        cached.fetch_concept_frontier().await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let upstream = Arc::new(CountingFrontier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cached = CachedFrontierClient::new(upstream.clone(), Duration::from_secs(30));

        assert!(cached.fetch_concept_frontier().await.is_err());
        assert!(cached.fetch_concept_frontier().await.is_err());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }
}
