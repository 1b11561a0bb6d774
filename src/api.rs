//! 旧版调用入口
//!
//! 早期版本通过 `retcon.<method>(html, ...)` 调用过滤器。这里保留同样的入口，
//! 每次调用都会记录一条弃用警告，然后转给 [`Retcon`] 执行。

use serde_json::Value;

use crate::core::{Markup, Retcon, RetconError, RetconResult};
use crate::filters::FILTER_PREFIX;

/// 模板过滤器名：`retcon` 加首字母大写的方法名
pub fn filter_alias(method: &str) -> String {
    let mut chars = method.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", FILTER_PREFIX, first.to_ascii_uppercase(), chars.as_str()),
        None => FILTER_PREFIX.to_string(),
    }
}

#[deprecated(since = "3.0.0", note = "call `Retcon::apply` or `Retcon::run` instead")]
pub struct RetconApi<'a> {
    retcon: &'a Retcon,
}

#[allow(deprecated)]
impl<'a> RetconApi<'a> {
    pub fn new(retcon: &'a Retcon) -> Self {
        RetconApi { retcon }
    }

    /// 按方法名调用单个过滤器
    pub fn call(&self, method: &str, html: &str, args: Vec<Value>) -> RetconResult<Markup> {
        if method == FILTER_PREFIX {
            return self.retcon(html, &Value::Array(args));
        }

        let filter = self
            .retcon
            .registry()
            .get(method)
            .ok_or_else(|| RetconError::UnknownOperation(method.to_string()))?;

        tracing::warn!(
            "`retcon.{}` is deprecated. Use the `{}` filter instead.",
            method,
            filter_alias(filter.name())
        );

        self.retcon.apply(html, filter.name(), args)
    }

    /// 执行操作列表，格式同 [`Retcon::run_value`]
    pub fn retcon(&self, html: &str, ops: &Value) -> RetconResult<Markup> {
        tracing::warn!("`retcon.retcon` is deprecated. Use the `retcon` filter instead.");
        self.retcon.run_value(html, ops)
    }
}
