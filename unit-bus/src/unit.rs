//! 工作单元（Unit）
//!
//! 表达一次可分发的工作：业务操作（Operation）或后台任务（Job）。
//! - `NAME`：稳定名称，用于按名编组、日志与事件。避免依赖 `type_name::<T>()`；
//! - `CAPABILITIES`：编译期声明的能力标签（是否入队、是否为 Operation/Job）。
//!
//! 分发时以类型擦除的 [`BoxedUnit`] 在编组器、执行器之间传递。
//!
use crate::arguments::ArgumentBag;
use crate::error::{AppError, AppResult};
use crate::marshal::Marshal;
use std::any::{Any, TypeId};
use std::fmt;

/// 能力标签
///
/// `operation` 与 `job` 互不排斥，可同时声明。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    queueable: bool,
    operation: bool,
    job: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        queueable: false,
        operation: false,
        job: false,
    };

    pub const fn queueable(mut self) -> Self {
        self.queueable = true;
        self
    }

    pub const fn operation(mut self) -> Self {
        self.operation = true;
        self
    }

    pub const fn job(mut self) -> Self {
        self.job = true;
        self
    }

    pub const fn is_queueable(&self) -> bool {
        self.queueable
    }

    pub const fn is_operation(&self) -> bool {
        self.operation
    }

    pub const fn is_job(&self) -> bool {
        self.job
    }
}

pub trait Unit: Marshal + fmt::Debug + Send + Sync + 'static {
    /// 稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    const CAPABILITIES: Capabilities = Capabilities::NONE;
}

// 对象安全的擦除视图
trait DynUnit: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;
    fn arguments(&self) -> AppResult<ArgumentBag>;
    fn rebuild(&self, args: ArgumentBag) -> AppResult<BoxedUnit>;
    fn normalize(&self, args: ArgumentBag) -> AppResult<ArgumentBag>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<U: Unit> DynUnit for U {
    fn name(&self) -> &'static str {
        U::NAME
    }

    fn capabilities(&self) -> Capabilities {
        U::CAPABILITIES
    }

    fn arguments(&self) -> AppResult<ArgumentBag> {
        self.to_arguments()
    }

    fn rebuild(&self, args: ArgumentBag) -> AppResult<BoxedUnit> {
        U::from_arguments(args).map(BoxedUnit::new)
    }

    fn normalize(&self, args: ArgumentBag) -> AppResult<ArgumentBag> {
        U::from_arguments(args)?.to_arguments()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// 类型擦除的 Unit 实例，附带可选的目标队列
pub struct BoxedUnit {
    inner: Box<dyn DynUnit>,
    queue: Option<String>,
}

impl BoxedUnit {
    pub fn new<U: Unit>(unit: U) -> Self {
        Self {
            inner: Box::new(unit),
            queue: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    /// 还原当前实例的构造参数
    pub fn arguments(&self) -> AppResult<ArgumentBag> {
        self.inner.arguments()
    }

    /// 以同一 Unit 类型、给定构造参数重新编组，保留目标队列
    pub fn rebuild(&self, args: ArgumentBag) -> AppResult<BoxedUnit> {
        let mut unit = self.inner.rebuild(args)?;
        unit.queue = self.queue.clone();
        Ok(unit)
    }

    /// 经同一 Unit 类型编组再还原，补齐可选参数与默认值
    ///
    /// 部分参数集合与完整参数集合描述同一实例时，规范化后相等。
    pub fn normalize(&self, args: ArgumentBag) -> AppResult<ArgumentBag> {
        self.inner.normalize(args)
    }

    /// 具体 Unit 类型的 `TypeId`
    pub fn unit_type_id(&self) -> TypeId {
        self.inner.as_any().type_id()
    }

    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.set_queue(queue);
        self
    }

    pub fn set_queue(&mut self, queue: impl Into<String>) {
        self.queue = Some(queue.into());
    }

    pub fn is<U: Unit>(&self) -> bool {
        self.unit_type_id() == TypeId::of::<U>()
    }

    pub fn downcast_ref<U: Unit>(&self) -> Option<&U> {
        self.inner.as_any().downcast_ref::<U>()
    }

    pub fn downcast<U: Unit>(self) -> AppResult<U> {
        let found = self.name();
        self.inner
            .into_any()
            .downcast::<U>()
            .map(|u| *u)
            .map_err(|_| AppError::TypeMismatch {
                expected: U::NAME,
                found,
            })
    }
}

impl fmt::Debug for BoxedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedUnit")
            .field("unit", &self.inner)
            .field("queue", &self.queue)
            .finish()
    }
}

impl<U: Unit> From<U> for BoxedUnit {
    fn from(unit: U) -> Self {
        BoxedUnit::new(unit)
    }
}

/// 分发入口接受的 Unit 描述：已构造的实例，或按名称编组
#[derive(Debug)]
pub enum UnitSource {
    Instance(BoxedUnit),
    Name(String),
}

impl UnitSource {
    pub fn is_instance(&self) -> bool {
        matches!(self, UnitSource::Instance(_))
    }
}

impl<U: Unit> From<U> for UnitSource {
    fn from(unit: U) -> Self {
        UnitSource::Instance(BoxedUnit::new(unit))
    }
}

impl From<BoxedUnit> for UnitSource {
    fn from(unit: BoxedUnit) -> Self {
        UnitSource::Instance(unit)
    }
}

impl From<&str> for UnitSource {
    fn from(name: &str) -> Self {
        UnitSource::Name(name.to_string())
    }
}

impl From<String> for UnitSource {
    fn from(name: String) -> Self {
        UnitSource::Name(name)
    }
}
