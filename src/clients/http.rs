//! 基于 reqwest 的练习服务客户端
//!
//! - `GET  concepts/frontier`：幂等，瞬时错误按指数退避重试
//! - `POST practice/drills`：不重试，失败交由队列在下一次自然触发时重试
//! - `POST reviews`：不重试，失败保留队首由用户重新提交

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{ConceptFrontierClient, DrillGeneratorClient, ReviewSubmissionClient};
use crate::practice::config::PracticeConfig;
use crate::practice::error::{PracticeError, PracticeResult};
use crate::practice::types::{
    DrillBatch, DrillRequest, RawFrontier, ReviewBatchResponse, ReviewSubmission,
};

pub const FRONTIER_PATH: &str = "concepts/frontier";
pub const DRILLS_PATH: &str = "practice/drills";
pub const REVIEWS_PATH: &str = "reviews";

/// 错误响应体在日志与错误信息中保留的最大字符数
const MAX_ERROR_BODY_CHARS: usize = 300;

/// 练习服务 HTTP 客户端
#[derive(Debug, Clone)]
pub struct HttpPracticeClient {
    base_url: Url,
    api_token: Option<String>,
    http: Client,
    retry_attempts: usize,
    retry_initial_delay: Duration,
}

impl HttpPracticeClient {
    pub fn new(config: &PracticeConfig) -> PracticeResult<Self> {
        config.validate()?;

        // 保证以 '/' 结尾，否则 join 会替换掉最后一段路径
        let mut raw = config.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|e| PracticeError::Configuration(format!("invalid api_base_url: {}", e)))?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PracticeError::Configuration(format!("构建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            base_url,
            api_token: config
                .api_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            http,
            retry_attempts: config.frontier_retry_attempts.max(1),
            retry_initial_delay: Duration::from_millis(config.frontier_retry_initial_delay_ms),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> PracticeResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PracticeError::Configuration(format!("invalid endpoint {}: {}", path, e)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 发送请求并解析 JSON；非 2xx 映射为 `PracticeError::Http`
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> PracticeResult<T> {
        let resp = self.authorize(builder).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!("[PracticeHttp] {} returned {}: {}", path, status, message);
            return Err(PracticeError::Http {
                status: status.as_u16(),
                endpoint: path.to_string(),
                message,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_frontier_once(&self) -> PracticeResult<RawFrontier> {
        let url = self.endpoint(FRONTIER_PATH)?;
        self.send_json(self.http.get(url), FRONTIER_PATH).await
    }
}

#[async_trait]
impl ConceptFrontierClient for HttpPracticeClient {
    async fn fetch_concept_frontier(&self) -> PracticeResult<RawFrontier> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_initial_delay)
            .with_max_times(self.retry_attempts.saturating_sub(1));

        let frontier = (|| async { self.fetch_frontier_once().await })
            .retry(&backoff)
            .when(|e: &PracticeError| e.is_transient())
            .await?;

        debug!(
            "[PracticeHttp] Frontier fetched: due={}, frontier={}, coming_soon={}",
            frontier.due_for_review.len(),
            frontier.frontier.len(),
            frontier.coming_soon.len()
        );
        Ok(frontier)
    }
}

#[async_trait]
impl DrillGeneratorClient for HttpPracticeClient {
    async fn fetch_practice_drills(&self, request: &DrillRequest) -> PracticeResult<DrillBatch> {
        let url = self.endpoint(DRILLS_PATH)?;
        let batch: DrillBatch = self
            .send_json(self.http.post(url).json(request), DRILLS_PATH)
            .await?;
        debug!(
            "[PracticeHttp] Drills fetched for {}: requested={}, returned={}",
            request.concept_id,
            request.count,
            batch.drills.len()
        );
        Ok(batch)
    }
}

#[async_trait]
impl ReviewSubmissionClient for HttpPracticeClient {
    async fn submit_review(
        &self,
        submissions: &[ReviewSubmission],
    ) -> PracticeResult<ReviewBatchResponse> {
        let url = self.endpoint(REVIEWS_PATH)?;
        let body = serde_json::json!({ "reviews": submissions });
        self.send_json(self.http.post(url).json(&body), REVIEWS_PATH)
            .await
    }
}
