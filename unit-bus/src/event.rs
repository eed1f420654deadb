//! 分发事件
//!
//! Unit 提交之后按能力标签发布：
//! - Operation → `OperationStarted`
//! - Job → `JobStarted`
//!
//! 两个标签独立判断，同时声明时两个事件都会发布。
//!
use crate::arguments::ArgumentBag;
use crate::context::BusinessContext;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitEventKind {
    OperationStarted,
    JobStarted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitEvent {
    pub kind: UnitEventKind,
    /// Unit 稳定名称
    pub unit: String,
    /// 调用方传入的原始参数（请求源取其全部输入）
    pub arguments: ArgumentBag,
    /// 分发调用方的业务语境（关联、因果、执行者）
    #[serde(flatten)]
    pub biz: BusinessContext,
    pub occurred_at: DateTime<Utc>,
}

impl UnitEvent {
    pub fn new(kind: UnitEventKind, unit: impl Into<String>, arguments: ArgumentBag) -> Self {
        Self {
            kind,
            unit: unit.into(),
            arguments,
            biz: BusinessContext::default(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_business_context(mut self, biz: BusinessContext) -> Self {
        self.biz = biz;
        self
    }
}

/// 事件发布器
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: UnitEvent) -> Result<(), AppError>;
}
