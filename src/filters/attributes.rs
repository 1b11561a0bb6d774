//! 属性类过滤器
//!
//! `attr` 写入、追加或删除属性，`renameAttr` 重命名属性。
//! 写入前的值会被规范化：`class` 去重后用空格连接，`style` 的对象形式
//! 转换为 `name: value;` 声明，`data`/`aria` 等前缀属性的对象形式展开为
//! 多个 `data-<key>` 属性，其他数组或对象编码为 JSON。

use markup5ever_rcdom::Handle;
use serde_json::{Map, Value};

use crate::core::{Retcon, RetconResult};
use crate::parsers::html::dom::{get_node_attr, has_node_attr, set_node_attr};
use crate::parsers::html::Fragment;

use super::{Filter, FilterArgs};

/// 对象值会被展开为 `<name>-<key>` 的属性
pub const DATA_ATTRIBUTES: &[&str] = &["aria", "data", "data-ng", "ng"];

/// `data`、`aria` 等前缀本身，或以 `data-`/`aria-` 开头的属性
fn is_data_attribute(name: &str) -> bool {
    DATA_ATTRIBUTES.contains(&name) || name.starts_with("data-") || name.starts_with("aria-")
}

/// 已有属性值的处理方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overwrite {
    Replace,
    Append,
    Prepend,
}

impl Overwrite {
    /// `true`/缺省为替换，`false` 与 `"append"` 为追加，`"prepend"` 为前置；其他值按替换处理
    pub fn from_value(value: Option<&Value>) -> Overwrite {
        match value {
            Some(Value::Bool(false)) => Overwrite::Append,
            Some(Value::String(mode)) if mode == "append" => Overwrite::Append,
            Some(Value::String(mode)) if mode == "prepend" => Overwrite::Prepend,
            _ => Overwrite::Replace,
        }
    }
}

/// 规范化后的属性值
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// 删除属性
    Remove,
    /// 无值的布尔属性
    Flag,
    Text(String),
}

/// 将 class 值拆分为去重后的类名
fn class_tokens(value: &Value) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        for token in text.split_whitespace() {
            if !tokens.iter().any(|existing| existing == token) {
                tokens.push(token.to_string());
            }
        }
    };

    match value {
        Value::String(text) => push(text),
        Value::Number(number) => push(&number.to_string()),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(text) => push(text),
                    Value::Number(number) => push(&number.to_string()),
                    _ => {}
                }
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                if let Value::String(text) = item {
                    push(text);
                }
            }
        }
        _ => {}
    }

    tokens
}

/// 解析 `a: b; c: d` 形式的样式声明，保持顺序，同名声明后者覆盖前者
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    let mut declarations: Vec<(String, String)> = Vec::new();
    for declaration in style.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }
        merge_declaration(&mut declarations, name, value);
    }
    declarations
}

fn merge_declaration(declarations: &mut Vec<(String, String)>, name: &str, value: &str) {
    match declarations.iter_mut().find(|(existing, _)| existing == name) {
        Some(declaration) => declaration.1 = value.to_string(),
        None => declarations.push((name.to_string(), value.to_string())),
    }
}

/// 输出 `name: value;` 声明，以空格分隔
pub fn render_style(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<String>>()
        .join(" ")
}

fn style_declarations(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::String(text) => parse_style(text),
        Value::Array(items) => {
            let mut declarations = Vec::new();
            for item in items {
                for (name, value) in style_declarations(item) {
                    merge_declaration(&mut declarations, &name, &value);
                }
            }
            declarations
        }
        Value::Object(map) => {
            let mut declarations = Vec::new();
            for (name, value) in map {
                let value = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    _ => continue,
                };
                merge_declaration(&mut declarations, name, &value);
            }
            declarations
        }
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// 规范化一个属性值，可能得到多个属性（`data` 展开）
pub fn normalize_attribute(name: &str, value: &Value) -> Vec<(String, AttributeValue)> {
    let normalized = match value {
        Value::Null | Value::Bool(false) => AttributeValue::Remove,
        Value::Bool(true) => AttributeValue::Flag,
        Value::Object(map) if is_data_attribute(name) => {
            return expand_data_attribute(name, map);
        }
        _ if name == "class" => {
            let tokens = class_tokens(value);
            if tokens.is_empty() && !value.is_string() {
                return Vec::new();
            }
            AttributeValue::Text(tokens.join(" "))
        }
        _ if name == "style" => {
            let declarations = style_declarations(value);
            match value {
                Value::String(text) if declarations.is_empty() => AttributeValue::Text(text.clone()),
                _ if declarations.is_empty() => return Vec::new(),
                _ => AttributeValue::Text(render_style(&declarations)),
            }
        }
        Value::Array(_) | Value::Object(_) => AttributeValue::Text(value.to_string()),
        other => AttributeValue::Text(scalar_text(other)),
    };

    vec![(name.to_string(), normalized)]
}

fn expand_data_attribute(prefix: &str, map: &Map<String, Value>) -> Vec<(String, AttributeValue)> {
    map.iter()
        .map(|(key, value)| {
            let normalized = match value {
                Value::Null | Value::Bool(false) => AttributeValue::Remove,
                Value::Bool(true) => AttributeValue::Flag,
                Value::Array(_) | Value::Object(_) => AttributeValue::Text(value.to_string()),
                other => AttributeValue::Text(scalar_text(other)),
            };
            (format!("{}-{}", prefix, key), normalized)
        })
        .collect()
}

/// 把新值与节点上已有的值合并
fn merge_with_current(name: &str, current: &str, value: &Value, mode: Overwrite) -> Value {
    let incoming: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    let current = Value::String(current.to_string());

    let ordered: Vec<Value> = match mode {
        Overwrite::Prepend => incoming.into_iter().chain(std::iter::once(current)).collect(),
        _ => std::iter::once(current).chain(incoming).collect(),
    };

    match name {
        "class" | "style" => Value::Array(ordered),
        _ => Value::String(
            ordered
                .iter()
                .map(scalar_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<String>>()
                .join(" "),
        ),
    }
}

/// 在单个节点上写入一组属性
pub fn apply_attributes(node: &Handle, attributes: &Map<String, Value>, mode: Overwrite) {
    for (key, value) in attributes {
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }

        let mergeable = mode != Overwrite::Replace
            && key != "id"
            && !value.is_boolean()
            && !value.is_null()
            && !value.is_object();

        let value = match get_node_attr(node, &key).filter(|current| !current.is_empty()) {
            Some(current) if mergeable => merge_with_current(&key, &current, value, mode),
            _ => value.clone(),
        };

        for (name, normalized) in normalize_attribute(&key, &value) {
            match normalized {
                AttributeValue::Remove => set_node_attr(node, &name, None),
                AttributeValue::Flag => set_node_attr(node, &name, Some(String::new())),
                AttributeValue::Text(text) => set_node_attr(node, &name, Some(text)),
            }
        }
    }
}

/// 向节点的 class 追加类名（去重）
pub fn add_class(node: &Handle, class_name: &str) {
    let current = get_node_attr(node, "class").unwrap_or_default();
    let tokens = class_tokens(&Value::Array(vec![
        Value::String(current),
        Value::String(class_name.to_string()),
    ]));
    set_node_attr(node, "class", Some(tokens.join(" ")));
}

/// `attr(selector, attributes, overwrite = true)`
pub struct AttrFilter;

impl Filter for AttrFilter {
    fn name(&self) -> &'static str {
        "attr"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let Some(attributes) = args.object(1)? else {
            return Ok(());
        };
        if attributes.is_empty() {
            return Ok(());
        }
        let mode = Overwrite::from_value(args.value(2));

        for node in fragment.query(&selectors) {
            apply_attributes(&node, attributes, mode);
        }

        Ok(())
    }
}

/// `renameAttr(selector, {old: new})`
pub struct RenameAttrFilter;

impl Filter for RenameAttrFilter {
    fn name(&self) -> &'static str {
        "renameAttr"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let Some(renames) = args.object(1)? else {
            return Ok(());
        };

        for node in fragment.query(&selectors) {
            for (existing, desired) in renames {
                let Some(desired) = desired.as_str().map(str::trim).filter(|name| !name.is_empty()) else {
                    continue;
                };
                let desired = desired.to_ascii_lowercase();
                if *existing == desired || !has_node_attr(&node, existing) {
                    continue;
                }

                let value = get_node_attr(&node, existing).unwrap_or_default();
                set_node_attr(&node, existing, None);
                set_node_attr(&node, &desired, Some(value));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(html: &str, filter: &dyn Filter, args: Vec<Value>) -> String {
        let retcon = Retcon::default();
        let fragment = Fragment::parse(html);
        filter.apply(&retcon, &fragment, &args).unwrap();
        fragment.serialize().unwrap()
    }

    #[test]
    fn sets_removes_and_flags() {
        assert_eq!(
            run(
                r#"<a href="x" title="t">a</a>"#,
                &AttrFilter,
                vec![json!("a"), json!({"title": false, "rel": "noopener", "download": true})]
            ),
            r#"<a href="x" rel="noopener" download="">a</a>"#
        );
    }

    #[test]
    fn class_append_dedupes() {
        let once = run(
            r#"<a class="foo">a</a>"#,
            &AttrFilter,
            vec![json!("a"), json!({"class": "foo bar"}), json!(false)],
        );
        assert_eq!(once, r#"<a class="foo bar">a</a>"#);
        let twice = run(&once, &AttrFilter, vec![json!("a"), json!({"class": "foo"}), json!("append")]);
        assert_eq!(twice, r#"<a class="foo bar">a</a>"#);
    }

    #[test]
    fn prepend_and_id() {
        assert_eq!(
            run(
                r#"<p id="a" title="one">x</p>"#,
                &AttrFilter,
                vec![json!("p"), json!({"id": "b", "title": "zero"}), json!("prepend")]
            ),
            r#"<p id="b" title="zero one">x</p>"#
        );
    }

    #[test]
    fn style_and_data_normalization() {
        assert_eq!(
            run(
                "<div>x</div>",
                &AttrFilter,
                vec![json!("div"), json!({"style": {"color": "red", "margin": 0}, "data": {"id": 5, "on": true}})]
            ),
            r#"<div style="color: red; margin: 0;" data-id="5" data-on="">x</div>"#
        );
        assert_eq!(
            run(
                r#"<div style="color: red">x</div>"#,
                &AttrFilter,
                vec![json!("div"), json!({"style": "color: blue; width: 1px"}), json!(false)]
            ),
            r#"<div style="color: blue; width: 1px;">x</div>"#
        );
        assert_eq!(
            run("<div>x</div>", &AttrFilter, vec![json!("div"), json!({"data-list": [1, 2]})]),
            r#"<div data-list="[1,2]">x</div>"#
        );
        assert_eq!(
            run("<div>x</div>", &AttrFilter, vec![json!("div"), json!({"data-user": {"id": 3, "tags": ["a"]}})]),
            r#"<div data-user-id="3" data-user-tags="[&quot;a&quot;]">x</div>"#
        );
    }

    #[test]
    fn empty_attribute_map_is_a_no_op() {
        assert_eq!(run("<p>x</p>", &AttrFilter, vec![json!("p"), json!({})]), "<p>x</p>");
        assert_eq!(run("<p>x</p>", &AttrFilter, vec![json!("p"), json!([])]), "<p>x</p>");
    }

    #[test]
    fn rename_moves_values() {
        assert_eq!(
            run(
                r#"<img src="a.png" alt="x">"#,
                &RenameAttrFilter,
                vec![json!("img"), json!({"src": "data-src", "alt": "alt", "title": "x", "width": ""})]
            ),
            r#"<img alt="x" data-src="a.png">"#
        );
    }

    #[test]
    fn overwrite_modes() {
        assert_eq!(Overwrite::from_value(None), Overwrite::Replace);
        assert_eq!(Overwrite::from_value(Some(&json!(true))), Overwrite::Replace);
        assert_eq!(Overwrite::from_value(Some(&json!(false))), Overwrite::Append);
        assert_eq!(Overwrite::from_value(Some(&json!("prepend"))), Overwrite::Prepend);
        assert_eq!(Overwrite::from_value(Some(&json!("sideways"))), Overwrite::Replace);
    }
}
