use crate::{
    context::AppContext,
    error::{AppError, AppResult},
    executor::Executor,
    unit::{BoxedUnit, Unit},
    unit_handler::UnitHandler,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use std::any::TypeId;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, AppError>> + Send + 'a>>;

type HandlerFn =
    Arc<dyn for<'a> Fn(BoxedUnit, &'a AppContext) -> HandlerFuture<'a> + Send + Sync>;

fn erase<F>(f: F) -> HandlerFn
where
    F: for<'a> Fn(BoxedUnit, &'a AppContext) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 入队单元的执行方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// 每个命名队列一个后台任务，按 FIFO 执行
    #[default]
    Background,
    /// 在 `submit_async` 返回前就地执行（进程内同步队列）
    Inline,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InMemoryExecutorConfig {
    pub mode: QueueMode,
    /// 未指定队列的单元进入该队列
    pub default_queue: String,
}

impl Default for InMemoryExecutorConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::Background,
            default_queue: crate::DEFAULT_QUEUE.to_string(),
        }
    }
}

struct QueuedUnit {
    ctx: AppContext,
    unit: BoxedUnit,
    handler: HandlerFn,
}

#[derive(Default)]
struct PendingUnits {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingUnits {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// 基于内存的 Executor 实现
/// - 通过 TypeId 注册不同 Unit 对应的 Handler
/// - 运行时以类型擦除（BoxedUnit）方式进行调度
/// - 入队单元由每个命名队列独立的 tokio 任务消费，失败与 panic 仅记录日志
///
/// 队列的消费任务在首次投递到该队列名时创建，之后常驻，直到执行器被丢弃、
/// 发送端全部关闭后退出；不提供单独的关停或回收接口。
pub struct InMemoryExecutor {
    handlers: DashMap<TypeId, HandlerFn>,
    /// 队列名 → 消费任务的发送端，只增不减
    queues: DashMap<String, mpsc::UnboundedSender<QueuedUnit>>,
    pending: Arc<PendingUnits>,
    config: InMemoryExecutorConfig,
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::with_config(InMemoryExecutorConfig::default())
    }
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InMemoryExecutorConfig) -> Self {
        Self {
            handlers: DashMap::new(),
            queues: DashMap::new(),
            pending: Arc::new(PendingUnits::default()),
            config,
        }
    }

    /// 注册 Unit 处理器
    pub fn register<U, H>(&self, handler: Arc<H>) -> AppResult<()>
    where
        U: Unit,
        H: UnitHandler<U> + 'static,
    {
        let key = TypeId::of::<U>();
        if self.handlers.contains_key(&key) {
            return Err(AppError::AlreadyRegistered { unit: U::NAME });
        }

        let f = erase(move |unit, ctx| {
            let handler = handler.clone();

            Box::pin(async move {
                // 键与闭包同一泛型 U，正常情况下 downcast 不会失败
                let unit = unit.downcast::<U>()?;
                let out = handler.handle(ctx, unit).await?;
                Ok::<Value, AppError>(serde_json::to_value(out)?)
            })
        });

        self.handlers.insert(key, f);

        Ok(())
    }

    /// 尚未执行完毕的入队单元数
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// 等待所有已入队单元执行完毕
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 已创建消费任务的队列名
    pub fn queues(&self) -> Vec<String> {
        self.queues.iter().map(|q| q.key().clone()).collect()
    }

    fn handler_for(&self, unit: &BoxedUnit) -> AppResult<HandlerFn> {
        self.handlers
            .get(&unit.unit_type_id())
            .map(|h| h.clone())
            .ok_or(AppError::HandlerNotFound(unit.name()))
    }

    fn sender_for(&self, queue: &str) -> mpsc::UnboundedSender<QueuedUnit> {
        if let Some(tx) = self.queues.get(queue) {
            return tx.value().clone();
        }

        self.queues
            .entry(queue.to_string())
            .or_insert_with(|| spawn_worker(queue.to_string(), self.pending.clone()))
            .value()
            .clone()
    }
}

fn spawn_worker(queue: String, pending: Arc<PendingUnits>) -> mpsc::UnboundedSender<QueuedUnit> {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueuedUnit>();

    tokio::spawn(async move {
        tracing::debug!(queue = %queue, "queue worker started");
        while let Some(QueuedUnit { ctx, unit, handler }) = rx.recv().await {
            let name = unit.name();
            // 处理器 panic 不能终止消费任务，否则该队列后续投递全部失败
            match AssertUnwindSafe((handler)(unit, &ctx)).catch_unwind().await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(unit = name, queue = %queue, error = %e, "queued unit failed");
                }
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(unit = name, queue = %queue, reason = %reason, "queued unit panicked");
                }
            }
            pending.finish();
        }
        tracing::debug!(queue = %queue, "queue worker stopped");
    });

    tx
}

#[async_trait]
impl Executor for InMemoryExecutor {
    async fn submit_sync(&self, ctx: &AppContext, unit: BoxedUnit) -> Result<Value, AppError> {
        let f = self.handler_for(&unit)?;
        tracing::debug!(unit = unit.name(), "executing unit");
        (f)(unit, ctx).await
    }

    async fn submit_async(&self, ctx: &AppContext, unit: BoxedUnit) -> Result<(), AppError> {
        let handler = self.handler_for(&unit)?;
        let queue = unit
            .queue()
            .unwrap_or(&self.config.default_queue)
            .to_string();

        match self.config.mode {
            QueueMode::Inline => {
                tracing::debug!(unit = unit.name(), queue = %queue, "executing queued unit inline");
                (handler)(unit, ctx).await.map(|_| ())
            }
            QueueMode::Background => {
                tracing::debug!(unit = unit.name(), queue = %queue, "enqueueing unit");
                let tx = self.sender_for(&queue);
                self.pending.begin();
                let job = QueuedUnit {
                    ctx: ctx.clone(),
                    unit,
                    handler,
                };
                if let Err(e) = tx.send(job) {
                    self.pending.finish();
                    return Err(AppError::Queue {
                        queue,
                        reason: e.to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}
