//! 工作单元过程宏（unit-macros）
//!
//! `#[unit(...)]`：为具名字段结构体实现 `::unit_bus::unit::Unit` 与
//! `::unit_bus::marshal::Marshal`，字段即构造参数（按声明顺序）。
//!
use proc_macro::TokenStream;

mod unit;
mod utils;

/// Unit 宏
/// - 合并/追加派生：Debug, Clone
/// - 参数：`#[unit(name = "SendEmail", queueable, operation, job)]`，`name` 默认取结构体名
/// - 字段参数：`#[unit(default)]` 缺失时取 `Default::default()`；`#[unit(rename = "x")]` 指定参数名
/// - `Option<T>` 字段视为可选参数
#[proc_macro_attribute]
pub fn unit(attr: TokenStream, item: TokenStream) -> TokenStream {
    unit::expand(attr, item)
}
