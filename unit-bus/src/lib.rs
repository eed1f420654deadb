//! 工作单元分发库（unit-bus）
//!
//! 把应用层的工作单元（Operation / Job）适配到执行后端：
//! - 参数编组（`marshaller`）：实例、名称 + 参数集合、名称 + 请求源三种输入形态；
//! - 提交决策（`dispatcher`）：按 `queueable` 能力选择同步或入队路径；
//! - 测试替身（`mock`）：测试模式下比对并替换传入实例；
//! - 事件（`event`）：Operation/Job 开始执行时发布。
//!
//! 队列、重试、序列化等策略由 `Executor` 的具体实现负责，本 crate 仅提供进程内参考实现。
//!
pub mod arguments;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod executor;
pub mod inmemory_event_publisher;
pub mod inmemory_executor;
pub mod marshal;
pub mod marshaller;
pub mod mock;
pub mod unit;
pub mod unit_handler;

pub use dispatcher::{Dispatched, Dispatcher, DispatcherConfig};
pub use inmemory_event_publisher::InMemoryEventPublisher;
pub use inmemory_executor::InMemoryExecutor;
pub use marshaller::Marshaller;
pub use mock::InMemoryMockRegistry;

/// 未指定队列时使用的队列名
pub const DEFAULT_QUEUE: &str = "default";

// 允许在本 crate 内部通过 ::unit_bus 进行自引用，
// 以便 `#[unit]` 宏在本 crate 的单元测试中也能解析到 ::unit_bus 路径。
extern crate self as unit_bus;
