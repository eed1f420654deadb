use crate::{context::AppContext, error::AppError, unit::BoxedUnit};
use async_trait::async_trait;
use serde_json::Value;

/// 执行器（Executor）
///
/// - `submit_sync`：就地执行并返回结果；
/// - `submit_async`：交给后端队列，仅等待入队被接受；
/// - 队列/重试/序列化等策略均由具体实现决定，分发层不介入。
#[async_trait]
pub trait Executor: Send + Sync {
    async fn submit_sync(&self, ctx: &AppContext, unit: BoxedUnit) -> Result<Value, AppError>;

    async fn submit_async(&self, ctx: &AppContext, unit: BoxedUnit) -> Result<(), AppError>;
}
