use crate::{context::AppContext, error::AppError, unit::Unit};
use async_trait::async_trait;
use serde::Serialize;

/// Unit 处理器：执行某一类型的 Unit
///
/// 同步路径下 `Output` 会序列化为 `serde_json::Value` 返回给调用方，
/// 入队路径下结果被丢弃。
#[async_trait]
pub trait UnitHandler<U>: Send + Sync
where
    U: Unit,
{
    type Output: Serialize + Send + 'static;

    async fn handle(&self, ctx: &AppContext, unit: U) -> Result<Self::Output, AppError>;
}
