//! 分发器（Dispatcher）
//!
//! 把“Unit 描述 + 参数”归一为一个具体实例，并决定提交路径：
//! 1. 非测试模式下的实例：直接提交；
//! 2. 名称 + 请求源：按构造参数名从请求提取，缺失时回退到 `extra`；
//! 3. 名称 + 参数集合：参数集合（由 `extra` 补齐缺失键）即完整构造参数；
//! 4. 测试模式下的实例：若 Mock 注册表登记了该类型，先比对再替换为按期望参数重建的替身；
//! 5. 声明 `queueable` 的单元走入队路径，其余走同步路径；
//! 6. 提交后按 Operation/Job 标签分别发布 `OperationStarted` / `JobStarted`。
//!
//! 事件发布失败只记录日志：此时单元已提交（同步单元已执行），向调用方报错会丢失处理器输出，
//! 并诱使调用方重复提交。
//!
//! 测试模式由构造时是否注入 `MockRegistry` 决定。
//!
use crate::arguments::{ArgumentBag, Arguments};
use crate::context::AppContext;
use crate::error::AppResult;
use crate::event::{EventPublisher, UnitEvent, UnitEventKind};
use crate::executor::Executor;
use crate::marshaller::Marshaller;
use crate::mock::MockRegistry;
use crate::unit::{BoxedUnit, Capabilities, UnitSource};
use bon::Builder;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 入队单元未指定队列时使用的队列名
    pub default_queue: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_queue: crate::DEFAULT_QUEUE.to_string(),
        }
    }
}

/// 一次 `run` 的提交结果
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    /// 同步执行完成，携带处理器输出
    Completed(Value),
    /// 已被队列接受，实际执行由执行器负责
    Queued { queue: String },
}

impl Dispatched {
    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatched::Queued { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Dispatched::Completed(v) => Some(v),
            Dispatched::Queued { .. } => None,
        }
    }

    pub fn into_output(self) -> Option<Value> {
        match self {
            Dispatched::Completed(v) => Some(v),
            Dispatched::Queued { .. } => None,
        }
    }
}

#[derive(Builder)]
pub struct Dispatcher {
    marshaller: Arc<Marshaller>,
    executor: Arc<dyn Executor>,
    publisher: Arc<dyn EventPublisher>,
    /// 注入后进入测试模式
    mocks: Option<Arc<dyn MockRegistry>>,
    #[builder(default)]
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn is_test_mode(&self) -> bool {
        self.mocks.is_some()
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    /// 分发一个 Unit：同步单元返回处理器输出，入队单元仅等待入队被接受
    ///
    /// 提交成功后即返回 `Ok`，事件发布失败不会改变结果。
    pub async fn run(
        &self,
        ctx: &AppContext,
        unit: impl Into<UnitSource>,
        arguments: impl Into<Arguments>,
        extra: ArgumentBag,
    ) -> AppResult<Dispatched> {
        let arguments = arguments.into();
        let unit = self.resolve(unit.into(), &arguments, &extra)?;
        let name = unit.name();
        let capabilities = unit.capabilities();

        let dispatched = if capabilities.is_queueable() {
            self.enqueue(ctx, unit).await?
        } else {
            tracing::debug!(unit = name, "dispatching unit synchronously");
            Dispatched::Completed(self.executor.submit_sync(ctx, unit).await?)
        };

        self.announce(ctx, name, capabilities, &arguments).await;

        Ok(dispatched)
    }

    /// 始终走入队路径，不返回处理器输出
    pub async fn run_async(
        &self,
        ctx: &AppContext,
        unit: impl Into<UnitSource>,
        arguments: impl Into<Arguments>,
        extra: ArgumentBag,
    ) -> AppResult<()> {
        let arguments = arguments.into();
        let unit = self.resolve(unit.into(), &arguments, &extra)?;
        let name = unit.name();
        let capabilities = unit.capabilities();

        self.enqueue(ctx, unit).await?;
        self.announce(ctx, name, capabilities, &arguments).await;

        Ok(())
    }

    /// 按位置参数实例化并投递到指定队列（`None` 使用默认队列），不发布事件
    pub async fn run_in_queue(
        &self,
        ctx: &AppContext,
        name: &str,
        arguments: Vec<Value>,
        queue: Option<&str>,
    ) -> AppResult<Dispatched> {
        let queue = queue.unwrap_or(&self.config.default_queue).to_string();
        let unit = self
            .marshaller
            .instantiate(name, arguments)?
            .on_queue(queue.clone());

        tracing::debug!(unit = unit.name(), queue = %queue, "dispatching unit to queue");
        self.executor.submit_async(ctx, unit).await?;

        Ok(Dispatched::Queued { queue })
    }

    fn resolve(
        &self,
        source: UnitSource,
        arguments: &Arguments,
        extra: &ArgumentBag,
    ) -> AppResult<BoxedUnit> {
        match source {
            UnitSource::Instance(unit) => match &self.mocks {
                Some(mocks) => Self::substitute(mocks.as_ref(), unit),
                None => Ok(unit),
            },
            name @ UnitSource::Name(_) => match arguments {
                Arguments::Request(request) => {
                    self.marshaller.build(name, Some(request.as_ref()), extra)
                }
                Arguments::Bag(bag) => self.marshaller.build(name, None, &bag.merged_with(extra)),
            },
        }
    }

    fn substitute(mocks: &dyn MockRegistry, unit: BoxedUnit) -> AppResult<BoxedUnit> {
        if !mocks.has(unit.name()) {
            return Ok(unit);
        }
        let Some(mock) = mocks.get(unit.name()) else {
            return Ok(unit);
        };

        let expected = mock.compare_to(&unit)?;
        tracing::debug!(unit = unit.name(), "substituting mocked unit");
        unit.rebuild(expected)
    }

    async fn enqueue(&self, ctx: &AppContext, mut unit: BoxedUnit) -> AppResult<Dispatched> {
        let queue = match unit.queue() {
            Some(q) => q.to_string(),
            None => {
                unit.set_queue(self.config.default_queue.clone());
                self.config.default_queue.clone()
            }
        };

        tracing::debug!(unit = unit.name(), queue = %queue, "enqueueing unit");
        self.executor.submit_async(ctx, unit).await?;

        Ok(Dispatched::Queued { queue })
    }

    async fn announce(
        &self,
        ctx: &AppContext,
        name: &'static str,
        capabilities: Capabilities,
        arguments: &Arguments,
    ) {
        if capabilities.is_operation() {
            self.publish(ctx, UnitEventKind::OperationStarted, name, arguments)
                .await;
        }

        if capabilities.is_job() {
            self.publish(ctx, UnitEventKind::JobStarted, name, arguments)
                .await;
        }
    }

    async fn publish(
        &self,
        ctx: &AppContext,
        kind: UnitEventKind,
        name: &'static str,
        arguments: &Arguments,
    ) {
        let event = UnitEvent::new(kind, name, arguments.snapshot())
            .with_business_context(ctx.biz.clone());

        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(unit = name, kind = ?kind, error = %e, "failed to publish unit event");
        }
    }
}
