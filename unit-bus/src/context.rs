use bon::Builder;
use serde::{Deserialize, Serialize};

/// 业务语境：随 `UnitEvent` 原样发布，用于跨单元追踪与审计
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    /// 同一业务流程内所有分发共享的关联ID
    correlation_id: Option<String>,
    /// 触发本次分发的上游消息ID
    causation_id: Option<String>,
    /// 触发分发的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发分发的主体ID
    actor_id: Option<String>,
}

impl BusinessContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }
}

/// 分发上下文（Application Context）
///
/// 承载一次分发调用所需的横切信息：
/// - 业务语境（`BusinessContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等，会随 `UnitEvent` 一并发布；
/// - 幂等键（`idempotency_key`）：交由执行器或处理器决定是否参与幂等。
///
/// 典型用法：
/// ```rust
/// use unit_bus::context::{AppContext, BusinessContext};
///
/// let ctx = AppContext {
///     biz: BusinessContext::builder()
///         .maybe_correlation_id(Some("cor-123".into()))
///         .maybe_actor_type(Some("user".into()))
///         .maybe_actor_id(Some("u-1".into()))
///         .build(),
///     idempotency_key: Some("idem-xyz".into()),
/// };
/// assert_eq!(ctx.biz.correlation_id(), Some("cor-123"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、审计主体、操作因果）
    pub biz: BusinessContext,
    /// 幂等键（可选）
    pub idempotency_key: Option<String>,
}
