//! 过滤器注册表
//!
//! 每个过滤器实现 `Filter` trait，由 `FilterRegistry` 按名称统一查找。
//! 查找同时接受模板风格的别名：`retconAttr`、`retconRemoveEmpty` 等
//! （`retcon` 前缀加首字母大写的过滤器名）。
//!
//! - `structure`: remove、only、change、wrap、unwrap、inject、removeEmpty
//! - `attributes`: attr、renameAttr
//! - `images`: transform、srcset、lazy、autoAlt、dimensions

pub mod attributes;
pub mod images;
pub mod structure;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{Retcon, RetconError, RetconResult};
use crate::parsers::html::Fragment;

/// 模板过滤器名称前缀
pub const FILTER_PREFIX: &str = "retcon";

/// 过滤器特征
///
/// 过滤器在同一个活动片段上原地修改；没有匹配节点时什么也不做。
pub trait Filter: Send + Sync {
    /// 过滤器名称（驼峰形式，如 `removeEmpty`）
    fn name(&self) -> &'static str;

    /// 在片段上执行过滤器，`args` 是按位置排列的参数（不含 HTML 本身）
    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()>;
}

/// 管道中的一步：过滤器名称加位置参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterOp {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl FilterOp {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        FilterOp {
            name: name.into(),
            args,
        }
    }

    /// 从 JSON 解析操作
    ///
    /// 接受三种形式：
    ///
    /// - `"name"`：无参数的单个操作
    /// - `["name", arg1, arg2]`：单个操作
    /// - `[["name", arg1], ["other"], {"name": "x", "args": []}]`：操作列表
    ///
    /// 只有第一个元素是数组或对象时才按操作列表读取。因此 `["remove", "lazy"]`
    /// 是带一个参数的 `remove`，而不是两个操作；链式调用请写成
    /// `[["remove"], ["lazy"]]` 或 `[{"name": "remove"}, "lazy"]`。
    pub fn parse_ops(value: &Value) -> RetconResult<Vec<FilterOp>> {
        match value {
            Value::Null => Err(RetconError::MissingOperation),
            Value::Array(items) if items.is_empty() => Err(RetconError::MissingOperation),
            Value::Array(items) if items[0].is_array() || items[0].is_object() => {
                items.iter().map(FilterOp::parse_one).collect()
            }
            _ => Ok(vec![FilterOp::parse_one(value)?]),
        }
    }

    fn parse_one(value: &Value) -> RetconResult<FilterOp> {
        match value {
            Value::String(name) => Ok(FilterOp::new(name.clone(), Vec::new())),
            Value::Array(items) => match items.split_first() {
                Some((Value::String(name), args)) => Ok(FilterOp::new(name.clone(), args.to_vec())),
                Some(_) => Err(RetconError::invalid_argument(
                    FILTER_PREFIX,
                    "filter name must be a string",
                )),
                None => Err(RetconError::MissingOperation),
            },
            Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| RetconError::invalid_argument(FILTER_PREFIX, e.to_string())),
            other => Err(RetconError::invalid_argument(
                FILTER_PREFIX,
                format!("cannot read an operation from {}", other),
            )),
        }
    }
}

/// 将模板风格的名称（`retconRemoveEmpty`）还原为过滤器名（`removeEmpty`）
pub fn strip_filter_prefix(name: &str) -> Option<String> {
    let rest = name.strip_prefix(FILTER_PREFIX)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}

/// 过滤器注册表
pub struct FilterRegistry {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterRegistry {
    /// 创建注册表并注册全部内置过滤器
    pub fn new() -> Self {
        let mut registry = FilterRegistry {
            filters: Vec::new(),
        };

        registry.register(Box::new(images::TransformFilter));
        registry.register(Box::new(images::SrcsetFilter));
        registry.register(Box::new(images::LazyFilter));
        registry.register(Box::new(images::AutoAltFilter));
        registry.register(Box::new(images::DimensionsFilter));
        registry.register(Box::new(attributes::AttrFilter));
        registry.register(Box::new(attributes::RenameAttrFilter));
        registry.register(Box::new(structure::RemoveFilter));
        registry.register(Box::new(structure::OnlyFilter));
        registry.register(Box::new(structure::ChangeFilter));
        registry.register(Box::new(structure::WrapFilter));
        registry.register(Box::new(structure::UnwrapFilter));
        registry.register(Box::new(structure::InjectFilter));
        registry.register(Box::new(structure::RemoveEmptyFilter));

        registry
    }

    /// 注册过滤器；同名时先注册的优先
    pub fn register(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// 按名称或模板别名查找过滤器
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        let find = |wanted: &str| {
            self.filters
                .iter()
                .find(|filter| filter.name() == wanted)
                .map(|filter| filter.as_ref())
        };

        find(name).or_else(|| strip_filter_prefix(name).and_then(|stripped| find(&stripped)))
    }

    /// 全部已注册的过滤器名称
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 带类型检查的位置参数读取
///
/// `null` 与缺省参数等价。类型不符时返回 `InvalidArgument`，错误信息包含过滤器名称。
pub struct FilterArgs<'a> {
    filter: &'static str,
    args: &'a [Value],
}

impl<'a> FilterArgs<'a> {
    pub fn new(filter: &'static str, args: &'a [Value]) -> Self {
        FilterArgs { filter, args }
    }

    fn invalid(&self, index: usize, expected: &str) -> RetconError {
        RetconError::invalid_argument(
            self.filter,
            format!("argument {} must be {}", index + 1, expected),
        )
    }

    /// 参数类型正确但内容无效
    pub fn invalid_value(&self, index: usize, message: impl Into<String>) -> RetconError {
        RetconError::invalid_argument(
            self.filter,
            format!("argument {}: {}", index + 1, message.into()),
        )
    }

    /// 参数值；`null` 视为缺省
    pub fn value(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index).filter(|value| !value.is_null())
    }

    /// 选择器或选择器数组；缺省、空字符串、`false` 返回 `None`
    pub fn selectors(&self, index: usize) -> RetconResult<Option<Vec<String>>> {
        match self.value(index) {
            None | Some(Value::Bool(false)) => Ok(None),
            Some(Value::String(selector)) if selector.trim().is_empty() => Ok(None),
            Some(Value::String(selector)) => Ok(Some(vec![selector.clone()])),
            Some(Value::Array(items)) => {
                let selectors = items
                    .iter()
                    .map(|item| match item {
                        Value::String(selector) => Ok(selector.clone()),
                        _ => Err(self.invalid(index, "a selector string or a list of selectors")),
                    })
                    .collect::<RetconResult<Vec<String>>>()?;
                if selectors.iter().all(|selector| selector.trim().is_empty()) {
                    Ok(None)
                } else {
                    Ok(Some(selectors))
                }
            }
            Some(_) => Err(self.invalid(index, "a selector string or a list of selectors")),
        }
    }

    /// 必填选择器
    pub fn required_selectors(&self, index: usize) -> RetconResult<Vec<String>> {
        self.selectors(index)?
            .ok_or_else(|| self.invalid(index, "a selector string or a list of selectors"))
    }

    /// 选择器，缺省时使用默认值
    pub fn selectors_or(&self, index: usize, default: &str) -> RetconResult<Vec<String>> {
        Ok(self
            .selectors(index)?
            .unwrap_or_else(|| vec![default.to_string()]))
    }

    /// 字符串参数；`false` 视为缺省，数字会被转换为字符串
    pub fn string(&self, index: usize) -> RetconResult<Option<String>> {
        match self.value(index) {
            None | Some(Value::Bool(false)) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(_) => Err(self.invalid(index, "a string")),
        }
    }

    /// 布尔参数
    pub fn bool(&self, index: usize, default: bool) -> RetconResult<bool> {
        match self.value(index) {
            None => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(Value::Number(number)) => Ok(number.as_f64().map_or(false, |n| n != 0.0)),
            Some(_) => Err(self.invalid(index, "a boolean")),
        }
    }

    /// 对象参数
    pub fn object(&self, index: usize) -> RetconResult<Option<&'a Map<String, Value>>> {
        match self.value(index) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(Value::Array(items)) if items.is_empty() => Ok(None),
            Some(_) => Err(self.invalid(index, "an object")),
        }
    }
}
