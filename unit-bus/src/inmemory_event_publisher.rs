//! 内存版事件发布器（InMemoryEventPublisher）
//!
//! 基于 `tokio::sync::broadcast` 的轻量实现：
//! - `publish`：广播事件，无订阅者时忽略；
//! - `subscribe`：返回独立的接收端；
//! - 典型用途：测试环境、示例与本地开发。

use crate::error::AppError;
use crate::event::{EventPublisher, UnitEvent};
use async_trait::async_trait;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct InMemoryEventPublisher {
    tx: broadcast::Sender<UnitEvent>,
}

impl InMemoryEventPublisher {
    /// `capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnitEvent> {
        self.tx.subscribe()
    }
}

impl Default for InMemoryEventPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: UnitEvent) -> Result<(), AppError> {
        tracing::debug!(unit = %event.unit, kind = ?event.kind, "publishing unit event");
        // 若当前无订阅者，broadcast 的 send 会返回错误，这里视为非致命并忽略
        let _ = self.tx.send(event);
        Ok(())
    }
}
