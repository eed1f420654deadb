//! 编组器（Marshaller）
//!
//! 以名称为键的类型化工厂注册表，替代运行期反射：
//! - `build`：从请求源 + 额外参数（或仅额外参数）按构造参数名编组实例；
//! - `instantiate`：按位置参数构造实例（用于指定队列分发）。
//!
use crate::arguments::{ArgumentBag, RequestSource};
use crate::error::{AppError, AppResult};
use crate::marshal::Param;
use crate::unit::{BoxedUnit, Unit, UnitSource};
use dashmap::DashMap;
use serde_json::Value;

type BuildFn = fn(ArgumentBag) -> AppResult<BoxedUnit>;

#[derive(Clone, Copy)]
struct UnitFactory {
    params: &'static [Param],
    build: BuildFn,
}

fn build_boxed<U: Unit>(args: ArgumentBag) -> AppResult<BoxedUnit> {
    U::from_arguments(args).map(BoxedUnit::new)
}

/// 基于内存的 Unit 工厂注册表
pub struct Marshaller {
    factories: DashMap<&'static str, UnitFactory>,
}

impl Default for Marshaller {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }
}

impl Marshaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 Unit 工厂，同名重复注册返回错误
    pub fn register<U: Unit>(&self) -> AppResult<()> {
        if self.factories.contains_key(U::NAME) {
            return Err(AppError::AlreadyRegistered { unit: U::NAME });
        }

        self.factories.insert(
            U::NAME,
            UnitFactory {
                params: U::PARAMS,
                build: build_boxed::<U>,
            },
        );

        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// 已注册的 Unit 名称列表（只读视图）
    pub fn registered_units(&self) -> Vec<&'static str> {
        self.factories.iter().map(|e| *e.key()).collect()
    }

    /// 编组一个 Unit
    ///
    /// - 实例原样返回；
    /// - 名称：逐个构造参数先查 `request`，再查 `extras`；必填参数两处均缺失时返回
    ///   `AppError::Construction`，可选参数缺失取默认值；
    /// - 未声明为构造参数的键被忽略。
    pub fn build(
        &self,
        source: UnitSource,
        request: Option<&dyn RequestSource>,
        extras: &ArgumentBag,
    ) -> AppResult<BoxedUnit> {
        let name = match source {
            UnitSource::Instance(unit) => return Ok(unit),
            UnitSource::Name(name) => name,
        };

        let factory = self.factory(&name)?;

        let mut resolved = ArgumentBag::new();
        for param in factory.params {
            let value = request
                .and_then(|r| r.input(param.name))
                .or_else(|| extras.get(param.name).cloned());

            match value {
                Some(v) => {
                    resolved.insert(param.name, v);
                }
                None if param.required => {
                    return Err(AppError::construction(name, param.name));
                }
                None => {}
            }
        }

        (factory.build)(resolved)
    }

    /// 按名称与完整参数集合编组（无请求源）
    pub fn build_from(&self, name: &str, args: &ArgumentBag) -> AppResult<BoxedUnit> {
        self.build(UnitSource::Name(name.to_string()), None, args)
    }

    /// 按位置参数实例化
    ///
    /// 参数个数须介于必填参数个数与参数总数之间，类型不符同样视为实例化失败。
    pub fn instantiate(&self, name: &str, positional: Vec<Value>) -> AppResult<BoxedUnit> {
        let factory = self
            .factory(name)
            .map_err(|_| AppError::instantiation(name, "unknown unit"))?;

        let total = factory.params.len();
        let required = factory.params.iter().filter(|p| p.required).count();
        if positional.len() > total || positional.len() < required {
            return Err(AppError::instantiation(
                name,
                format!(
                    "expected {required}..={total} arguments, got {}",
                    positional.len()
                ),
            ));
        }

        let args: ArgumentBag = factory
            .params
            .iter()
            .map(|p| p.name)
            .zip(positional)
            .collect();

        // 位置参数缺位（可选参数之前出现必填参数）也在这里暴露
        (factory.build)(args).map_err(|e| AppError::instantiation(name, e.to_string()))
    }

    fn factory(&self, name: &str) -> AppResult<UnitFactory> {
        self.factories
            .get(name)
            .map(|f| *f.value())
            .ok_or_else(|| AppError::UnitNotFound(name.to_string()))
    }
}
