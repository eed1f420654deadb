//! 编组（Marshal）
//!
//! 描述一个 Unit 的构造参数表，以及如何从键值参数集合构造实例、
//! 如何把实例还原为构造参数（用于 Mock 比对与替身重建）。
//!
//! 通常由 `#[unit(...)]` 宏生成，无需手写。
//!
use crate::arguments::ArgumentBag;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 构造参数描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    /// 必填参数缺失时编组失败；可选参数缺失时取默认值
    pub required: bool,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

pub trait Marshal: Sized {
    /// 构造参数表（按声明顺序，也是位置参数的顺序）
    const PARAMS: &'static [Param];

    /// 由已解析的参数集合构造实例，集合中只包含 `PARAMS` 中出现的键
    fn from_arguments(args: ArgumentBag) -> AppResult<Self>;

    /// 还原为构造参数
    fn to_arguments(&self) -> AppResult<ArgumentBag>;
}

#[doc(hidden)]
pub fn take_required<T: DeserializeOwned>(
    args: &mut ArgumentBag,
    unit: &str,
    param: &str,
) -> AppResult<T> {
    let value = args
        .take(param)
        .ok_or_else(|| AppError::construction(unit, param))?;
    decode(value, unit, param)
}

#[doc(hidden)]
pub fn take_optional<T: DeserializeOwned + Default>(
    args: &mut ArgumentBag,
    unit: &str,
    param: &str,
) -> AppResult<T> {
    match args.take(param) {
        Some(value) => decode(value, unit, param),
        None => Ok(T::default()),
    }
}

#[doc(hidden)]
pub fn put<T: Serialize>(args: &mut ArgumentBag, param: &str, value: &T) -> AppResult<()> {
    args.insert(param, serde_json::to_value(value)?);
    Ok(())
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, unit: &str, param: &str) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::InvalidArgument {
        unit: unit.to_string(),
        param: param.to_string(),
        reason: e.to_string(),
    })
}
