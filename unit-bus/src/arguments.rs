//! 参数载体
//!
//! - `ArgumentBag`：构造参数名 → 值（`serde_json::Value`）的键值集合；
//! - `RequestSource`：类请求对象，按名称取值（HTTP 请求、表单等）；
//! - `Arguments`：分发调用的参数形态，二者之一。
//!
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// 构造参数集合（键为构造参数名）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentBag(Map<String, Value>);

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// 以 `fallback` 补齐当前集合缺失的键（已有键不覆盖）
    pub fn merged_with(&self, fallback: &ArgumentBag) -> ArgumentBag {
        let mut merged = self.clone();
        for (k, v) in fallback.0.iter() {
            if !merged.0.contains_key(k) {
                merged.0.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ArgumentBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ArgumentBag {
    type Error = crate::error::AppError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(crate::error::AppError::Validation(format!(
                "argument bag must be a json object, found {other}"
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ArgumentBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for ArgumentBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// 类请求参数源：按名称查找输入字段
pub trait RequestSource: Send + Sync {
    /// 按名称取值，不存在时返回 `None`
    fn input(&self, key: &str) -> Option<Value>;

    /// 全部输入（用于事件载荷）
    fn all(&self) -> ArgumentBag;

    fn has(&self, key: &str) -> bool {
        self.input(key).is_some()
    }
}

/// 简单的请求输入实现
///
/// 查找顺序：body → route → query，与常见 Web 框架的 `input()` 语义一致。
#[derive(Clone, Debug, Default)]
pub struct RequestInput {
    query: ArgumentBag,
    route: ArgumentBag,
    body: ArgumentBag,
}

impl RequestInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: ArgumentBag) -> Self {
        self.query = query;
        self
    }

    pub fn with_route(mut self, route: ArgumentBag) -> Self {
        self.route = route;
        self
    }

    pub fn with_body(mut self, body: ArgumentBag) -> Self {
        self.body = body;
        self
    }
}

impl RequestSource for RequestInput {
    fn input(&self, key: &str) -> Option<Value> {
        self.body
            .get(key)
            .or_else(|| self.route.get(key))
            .or_else(|| self.query.get(key))
            .cloned()
    }

    fn all(&self) -> ArgumentBag {
        self.body.merged_with(&self.route).merged_with(&self.query)
    }
}

/// 分发调用的参数形态
#[derive(Clone)]
pub enum Arguments {
    /// 键值参数集合
    Bag(ArgumentBag),
    /// 类请求对象，按构造参数名提取
    Request(Arc<dyn RequestSource>),
}

impl Arguments {
    pub fn none() -> Self {
        Arguments::Bag(ArgumentBag::default())
    }

    pub fn request(source: impl RequestSource + 'static) -> Self {
        Arguments::Request(Arc::new(source))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Arguments::Request(_))
    }

    /// 事件载荷中使用的原始参数快照
    pub fn snapshot(&self) -> ArgumentBag {
        match self {
            Arguments::Bag(bag) => bag.clone(),
            Arguments::Request(req) => req.all(),
        }
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self::none()
    }
}

impl From<ArgumentBag> for Arguments {
    fn from(bag: ArgumentBag) -> Self {
        Arguments::Bag(bag)
    }
}

impl From<Arc<dyn RequestSource>> for Arguments {
    fn from(source: Arc<dyn RequestSource>) -> Self {
        Arguments::Request(source)
    }
}

impl From<RequestInput> for Arguments {
    fn from(source: RequestInput) -> Self {
        Arguments::request(source)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arguments::Bag(bag) => f.debug_tuple("Bag").field(bag).finish(),
            Arguments::Request(req) => f.debug_tuple("Request").field(&req.all()).finish(),
        }
    }
}
