//! 测试替身（Mock）
//!
//! 测试中为某类 Unit 预先登记“期望的构造参数”。分发器处于测试模式时：
//! - 传入实例的构造参数须与某一组期望相等，否则返回 `AppError::MockMismatch`；
//! - 通过比对后，分发器按匹配到的那组参数重新编组出替身实例并提交。
//!
use crate::arguments::ArgumentBag;
use crate::error::{AppError, AppResult};
use crate::unit::{BoxedUnit, Unit};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// 某一 Unit 类型的期望集合
#[derive(Debug)]
pub struct MockExpectation {
    unit: &'static str,
    expectations: RwLock<Vec<ArgumentBag>>,
    matched: AtomicUsize,
}

impl MockExpectation {
    pub fn new(unit: &'static str) -> Self {
        Self {
            unit,
            expectations: RwLock::new(Vec::new()),
            matched: AtomicUsize::new(0),
        }
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// 追加一组期望的构造参数
    pub fn expect(&self, args: ArgumentBag) {
        self.write().push(args);
    }

    pub fn expectations(&self) -> Vec<ArgumentBag> {
        self.read().clone()
    }

    /// 已通过比对的分发次数
    pub fn times_matched(&self) -> usize {
        self.matched.load(Ordering::SeqCst)
    }

    /// 比对实例与期望，返回匹配到的那组构造参数（已规范化）
    ///
    /// 期望先经实例所属 Unit 类型编组再还原，省略的可选参数与默认值因此不影响比对；
    /// 无法编组的期望视为不匹配。
    pub fn compare_to(&self, unit: &BoxedUnit) -> AppResult<ArgumentBag> {
        let actual = unit.arguments()?;
        let expectations = self.read();

        let found = expectations
            .iter()
            .filter_map(|expected| unit.normalize(expected.clone()).ok())
            .find(|normalized| *normalized == actual);

        match found {
            Some(found) => {
                self.matched.fetch_add(1, Ordering::SeqCst);
                Ok(found)
            }
            None => Err(AppError::MockMismatch {
                unit: self.unit.to_string(),
                expected: format!(
                    "[{}]",
                    expectations
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                actual: actual.to_string(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ArgumentBag>> {
        self.expectations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ArgumentBag>> {
        self.expectations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Mock 注册表：测试准备阶段写入，分发期间只读
pub trait MockRegistry: Send + Sync {
    fn has(&self, unit: &str) -> bool;

    fn get(&self, unit: &str) -> Option<Arc<MockExpectation>>;
}

/// 基于内存的 Mock 注册表
#[derive(Default)]
pub struct InMemoryMockRegistry {
    mocks: DashMap<&'static str, Arc<MockExpectation>>,
}

impl InMemoryMockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `U` 登记一组期望的构造参数，可多次调用
    pub fn expect<U: Unit>(&self, args: ArgumentBag) -> Arc<MockExpectation> {
        let mock = self
            .mocks
            .entry(U::NAME)
            .or_insert_with(|| Arc::new(MockExpectation::new(U::NAME)))
            .value()
            .clone();
        mock.expect(args);
        mock
    }

    /// 以实例的构造参数作为期望
    pub fn expect_instance<U: Unit>(&self, unit: &U) -> AppResult<Arc<MockExpectation>> {
        Ok(self.expect::<U>(unit.to_arguments()?))
    }

    pub fn clear(&self) {
        self.mocks.clear();
    }
}

impl MockRegistry for InMemoryMockRegistry {
    fn has(&self, unit: &str) -> bool {
        self.mocks.contains_key(unit)
    }

    fn get(&self, unit: &str) -> Option<Arc<MockExpectation>> {
        self.mocks.get(unit).map(|m| m.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{Marshal, Param, put, take_optional, take_required};

    #[derive(Debug)]
    struct Charge {
        amount: u64,
    }

    impl Marshal for Charge {
        const PARAMS: &'static [Param] = &[Param::required("amount")];

        fn from_arguments(mut args: ArgumentBag) -> AppResult<Self> {
            Ok(Self {
                amount: take_required(&mut args, Self::NAME, "amount")?,
            })
        }

        fn to_arguments(&self) -> AppResult<ArgumentBag> {
            let mut args = ArgumentBag::new();
            put(&mut args, "amount", &self.amount)?;
            Ok(args)
        }
    }

    impl Unit for Charge {
        const NAME: &'static str = "Charge";
    }

    #[derive(Debug)]
    struct Refund {
        amount: u64,
        reason: Option<String>,
    }

    impl Marshal for Refund {
        const PARAMS: &'static [Param] = &[Param::required("amount"), Param::optional("reason")];

        fn from_arguments(mut args: ArgumentBag) -> AppResult<Self> {
            Ok(Self {
                amount: take_required(&mut args, Self::NAME, "amount")?,
                reason: take_optional(&mut args, Self::NAME, "reason")?,
            })
        }

        fn to_arguments(&self) -> AppResult<ArgumentBag> {
            let mut args = ArgumentBag::new();
            put(&mut args, "amount", &self.amount)?;
            put(&mut args, "reason", &self.reason)?;
            Ok(args)
        }
    }

    impl Unit for Refund {
        const NAME: &'static str = "Refund";
    }

    #[test]
    fn expectations_accumulate_per_unit() {
        let registry = InMemoryMockRegistry::new();
        registry.expect::<Charge>(ArgumentBag::new().with("amount", 10));
        registry
            .expect_instance(&Charge { amount: 20 })
            .unwrap();

        assert!(registry.has("Charge"));
        assert!(!registry.has("Refund"));
        let mock = registry.get("Charge").unwrap();
        assert_eq!(mock.unit(), "Charge");
        assert_eq!(mock.expectations().len(), 2);
    }

    #[test]
    fn compare_to_matches_any_expectation() {
        let registry = InMemoryMockRegistry::new();
        registry.expect::<Charge>(ArgumentBag::new().with("amount", 10));
        let mock = registry.expect::<Charge>(ArgumentBag::new().with("amount", 20));

        let found = mock
            .compare_to(&BoxedUnit::new(Charge { amount: 20 }))
            .unwrap();
        assert_eq!(found, ArgumentBag::new().with("amount", 20));
        assert_eq!(mock.times_matched(), 1);
    }

    #[test]
    fn compare_to_reports_mismatch() {
        let registry = InMemoryMockRegistry::new();
        let mock = registry.expect::<Charge>(ArgumentBag::new().with("amount", 10));

        let err = mock
            .compare_to(&BoxedUnit::new(Charge { amount: 99 }))
            .unwrap_err();
        match err {
            AppError::MockMismatch {
                unit,
                expected,
                actual,
            } => {
                assert_eq!(unit, "Charge");
                assert_eq!(expected, r#"[{"amount":10}]"#);
                assert_eq!(actual, r#"{"amount":99}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.times_matched(), 0);
    }

    #[test]
    fn omitted_optional_params_still_match() {
        let registry = InMemoryMockRegistry::new();
        // 不可编组的期望不参与匹配
        registry.expect::<Refund>(ArgumentBag::new().with("reason", "dup"));
        let mock = registry.expect::<Refund>(ArgumentBag::new().with("amount", 5));

        let found = mock
            .compare_to(&BoxedUnit::new(Refund {
                amount: 5,
                reason: None,
            }))
            .unwrap();
        assert_eq!(
            found,
            ArgumentBag::new()
                .with("amount", 5)
                .with("reason", serde_json::Value::Null)
        );
        assert_eq!(mock.times_matched(), 1);

        let err = mock
            .compare_to(&BoxedUnit::new(Refund {
                amount: 5,
                reason: Some("late".into()),
            }))
            .unwrap_err();
        assert!(matches!(err, AppError::MockMismatch { .. }));
    }
}
