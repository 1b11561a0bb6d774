//! XPath 位置路径
//!
//! 只支持由 `/`、`//` 连接的名称测试（`p`、`*`），以及一个判断“没有可见文本”的
//! 谓词 `[not(normalize-space())]`。其他表达式记录 debug 日志并返回空结果。

use std::rc::Rc;
use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::parsers::html::dom::{get_node_name, get_text_content, is_element};
use crate::parsers::html::utils::is_blank_text;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// 小写标签名，`None` 表示 `*`
    name: Option<String>,
    blank_only: bool,
}

impl Step {
    fn matches(&self, node: &Handle) -> bool {
        let Some(name) = get_node_name(node) else {
            return false;
        };
        if self.name.as_deref().map_or(false, |wanted| wanted != name) {
            return false;
        }
        !self.blank_only || is_blank_text(&get_text_content(node))
    }
}

fn parse_step(axis: Axis, step: &str) -> Option<Step> {
    static STEP_RE: OnceLock<Regex> = OnceLock::new();
    let captures = STEP_RE
        .get_or_init(|| {
            Regex::new(
                r"^(?P<name>\*|[A-Za-z][A-Za-z0-9-]*)(?P<blank>\[\s*not\(\s*normalize-space\(\s*\)\s*\)\s*\])?$",
            )
            .expect("static regex")
        })
        .captures(step.trim())?;

    let name = &captures["name"];
    Some(Step {
        axis,
        name: (name != "*").then(|| name.to_ascii_lowercase()),
        blank_only: captures.name("blank").is_some(),
    })
}

fn parse_path(expression: &str) -> Option<Vec<Step>> {
    let expression = expression.trim();
    let mut rest = expression
        .strip_prefix('.')
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(expression);

    let mut steps = Vec::new();
    while !rest.is_empty() {
        let (axis, tail) = if let Some(tail) = rest.strip_prefix("//") {
            (Axis::Descendant, tail)
        } else if let Some(tail) = rest.strip_prefix('/') {
            (Axis::Child, tail)
        } else if steps.is_empty() {
            (Axis::Child, rest)
        } else {
            return None;
        };

        let end = tail.find('/').unwrap_or(tail.len());
        steps.push(parse_step(axis, &tail[..end])?);
        rest = &tail[end..];
    }

    (!steps.is_empty()).then_some(steps)
}

fn collect_descendants(node: &Handle, step: &Step, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if is_element(child) {
            if step.matches(child) {
                found.push(child.clone());
            }
            collect_descendants(child, step, found);
        }
    }
}

/// 以 `root` 为根执行位置路径，结果按文档顺序排列且不含 `root` 本身
///
/// `/` 与相对路径都从 `root` 的子节点开始。
pub fn query_xpath(root: &Handle, expression: &str) -> Vec<Handle> {
    let Some(steps) = parse_path(expression) else {
        tracing::debug!("不支持的 XPath 表达式 \"{}\"", expression);
        return Vec::new();
    };

    let mut context = vec![root.clone()];
    for step in steps.iter() {
        let mut next: Vec<Handle> = Vec::new();
        for node in context.iter() {
            let mut found = Vec::new();
            match step.axis {
                Axis::Child => found.extend(
                    node.children
                        .borrow()
                        .iter()
                        .filter(|child| step.matches(child))
                        .cloned(),
                ),
                Axis::Descendant => collect_descendants(node, step, &mut found),
            }
            for candidate in found {
                if !next.iter().any(|seen| Rc::ptr_eq(seen, &candidate)) {
                    next.push(candidate);
                }
            }
        }
        context = next;
    }

    context
}
