//! 外部协作服务 trait 定义
//!
//! 三个远端服务均返回原始（未归一化）载荷，归一化统一在 `practice::types` 中完成。

use async_trait::async_trait;

use crate::practice::error::PracticeResult;
use crate::practice::types::{
    DrillBatch, DrillRequest, RawFrontier, ReviewBatchResponse, ReviewSubmission,
};

/// 概念前沿服务：到期、前沿、即将到期的概念
#[async_trait]
pub trait ConceptFrontierClient: Send + Sync {
    async fn fetch_concept_frontier(&self) -> PracticeResult<RawFrontier>;

    /// 丢弃本地缓存（无缓存的实现为空操作）
    async fn invalidate(&self) {}
}

/// 出题服务：按概念生成练习题，可能少于请求数量（包括 0）
#[async_trait]
pub trait DrillGeneratorClient: Send + Sync {
    async fn fetch_practice_drills(&self, request: &DrillRequest) -> PracticeResult<DrillBatch>;
}

/// 复习提交服务：批量接口，引擎始终提交单元素批次
#[async_trait]
pub trait ReviewSubmissionClient: Send + Sync {
    async fn submit_review(
        &self,
        submissions: &[ReviewSubmission],
    ) -> PracticeResult<ReviewBatchResponse>;
}
