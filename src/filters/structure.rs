//! 结构类过滤器
//!
//! 删除、保留、改名、包裹、解包、注入和清理空节点。所有过滤器都先拿到
//! 查询结果的快照，再通过显式的父/子替换修改树。

use std::rc::Rc;

use markup5ever_rcdom::Handle;
use serde_json::Value;

use crate::core::{Retcon, RetconError, RetconResult};
use crate::parsers::html::dom::{
    append_child, create_attribute, create_element, create_text_node, deep_clone, detach_node,
    get_node_attrs, get_node_name, get_parent_node, get_text_content, is_descendant_of, is_element,
    replace_node, set_text_content, take_children,
};
use crate::parsers::html::utils::{
    is_blank_text, is_opaque_element, is_valid_tag_name, is_void_element, looks_like_markup,
};
use crate::parsers::html::Fragment;
use crate::parsers::selector::parse_selector;

use super::{Filter, FilterArgs};

/// `remove(selector)`：删除匹配的节点及其子树
pub struct RemoveFilter;

impl Filter for RemoveFilter {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;

        for node in fragment.query(&selectors) {
            detach_node(&node);
        }

        Ok(())
    }
}

/// `only(selector)`：只保留匹配的节点（按文档顺序平铺），其余全部丢弃
pub struct OnlyFilter;

impl Filter for OnlyFilter {
    fn name(&self) -> &'static str {
        "only"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;

        let nodes = fragment.query(&selectors);
        // Detach first; dropping the old tree empties everything still inside it
        for node in nodes.iter() {
            detach_node(node);
        }
        fragment.replace_contents(nodes);

        Ok(())
    }
}

/// `change(selector, toTag)`：更换标签名；`toTag` 为假值时去掉标签、保留内容
pub struct ChangeFilter;

impl Filter for ChangeFilter {
    fn name(&self) -> &'static str {
        "change"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let to_tag = args.string(1)?.filter(|tag| !tag.trim().is_empty());

        if let Some(tag) = &to_tag {
            if !is_valid_tag_name(tag.trim()) {
                return Err(RetconError::invalid_argument(
                    self.name(),
                    format!("\"{}\" is not a valid tag name", tag),
                ));
            }
        }

        for node in fragment.query(&selectors) {
            if get_parent_node(&node).is_none() {
                continue;
            }

            let children = take_children(&node);
            match &to_tag {
                None => {
                    replace_node(&node, children);
                }
                Some(tag) => {
                    let element = create_element(tag.trim(), get_node_attrs(&node));
                    for child in children {
                        append_child(&element, child);
                    }
                    replace_node(&node, vec![element]);
                }
            }
        }

        Ok(())
    }
}

/// `wrap(selector, container)`：用 `tag`、`tag.class` 或 `tag#id` 描述的元素包裹每个匹配节点
pub struct WrapFilter;

impl Filter for WrapFilter {
    fn name(&self) -> &'static str {
        "wrap"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let container = args.string(1)?.ok_or_else(|| {
            RetconError::invalid_argument(self.name(), "a container selector is required")
        })?;

        let descriptor = parse_selector(&container);
        let tag = if descriptor.tag == "*" {
            "div".to_string()
        } else {
            descriptor.tag.clone()
        };

        if !is_valid_tag_name(&tag) {
            return Err(RetconError::invalid_argument(
                self.name(),
                format!("\"{}\" is not a valid tag name", tag),
            ));
        }

        for node in fragment.query(&selectors) {
            // One fresh wrapper per node
            let attrs = descriptor
                .attribute
                .iter()
                .map(|(attribute, value)| create_attribute(attribute.as_str(), value))
                .collect();
            let wrapper = create_element(&tag, attrs);

            if replace_node(&node, vec![wrapper.clone()]) {
                append_child(&wrapper, node);
            }
        }

        Ok(())
    }
}

/// `unwrap(selector)`：去掉匹配节点的父元素，父元素的全部子节点留在原位
pub struct UnwrapFilter;

impl Filter for UnwrapFilter {
    fn name(&self) -> &'static str {
        "unwrap"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let root = fragment.root();

        // Snapshot distinct parents before touching the tree
        let mut parents: Vec<Handle> = Vec::new();
        for node in fragment.query(&selectors) {
            let Some(parent) = get_parent_node(&node) else {
                continue;
            };
            if Rc::ptr_eq(&parent, root) {
                tracing::debug!("unwrap: refusing to unwrap the fragment root");
                continue;
            }
            if !parents.iter().any(|seen| Rc::ptr_eq(seen, &parent)) {
                parents.push(parent);
            }
        }

        for parent in parents {
            if !is_descendant_of(&parent, root) {
                continue;
            }
            let children = take_children(&parent);
            replace_node(&parent, children);
        }

        Ok(())
    }
}

/// `inject(selector, content, overwrite = false)`：向匹配节点注入文本或 HTML
pub struct InjectFilter;

impl Filter for InjectFilter {
    fn name(&self) -> &'static str {
        "inject"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.required_selectors(0)?;
        let content = args.string(1)?.unwrap_or_default();
        let overwrite = args.bool(2, false)?;

        let nodes = fragment.query(&selectors);
        if nodes.is_empty() {
            return Ok(());
        }

        // Parsed once, cloned into every target
        let template = looks_like_markup(&content).then(|| Fragment::parse(&content));

        for node in nodes {
            if get_node_name(&node).map_or(false, is_void_element) {
                tracing::debug!("inject: skipping void element");
                continue;
            }

            match &template {
                Some(template) => {
                    if overwrite {
                        drop(take_children(&node));
                    }
                    for child in template.root().children.borrow().iter() {
                        append_child(&node, deep_clone(child));
                    }
                }
                None if overwrite => {
                    if !content.is_empty() {
                        set_text_content(&node, &content);
                    }
                }
                None => {
                    if !content.is_empty() {
                        append_child(&node, create_text_node(&content));
                    }
                }
            }
        }

        Ok(())
    }
}

/// `removeEmpty(selector = null, removeBr = false)`：删除没有可见文本的元素
///
/// 空元素（`img`、`hr` 等）和内容不透明的元素（`svg`、`iframe` 等）及其后代永远保留；
/// `br` 只有在 `removeBr` 为真时才会被删除。
pub struct RemoveEmptyFilter;

impl RemoveEmptyFilter {
    fn is_removable(node: &Handle, root: &Handle, remove_br: bool) -> bool {
        let Some(name) = get_node_name(node) else {
            return false;
        };

        if name == "br" {
            if !remove_br {
                return false;
            }
        } else if is_void_element(name) || is_opaque_element(name) {
            return false;
        }

        if !is_descendant_of(node, root) {
            return false;
        }

        let mut current = get_parent_node(node);
        while let Some(ancestor) = current {
            if Rc::ptr_eq(&ancestor, root) {
                break;
            }
            if get_node_name(&ancestor).map_or(false, is_opaque_element) {
                return false;
            }
            current = get_parent_node(&ancestor);
        }

        // Children that survived (an <img>, a kept <br>) keep their parent alive
        !node.children.borrow().iter().any(is_element)
    }

    /// 按文档顺序收集 `node` 及其后代中只含空白文本的元素
    fn collect_blank(node: &Handle, remove_br: bool, found: &mut Vec<Handle>) {
        if let Some(name) = get_node_name(node) {
            if (remove_br || name != "br") && is_blank_text(&get_text_content(node)) {
                found.push(node.clone());
            }
        }
        for child in node.children.borrow().iter() {
            Self::collect_blank(child, remove_br, found);
        }
    }
}

impl Filter for RemoveEmptyFilter {
    fn name(&self) -> &'static str {
        "removeEmpty"
    }

    fn apply(&self, _retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors(0)?;
        let remove_br = args.bool(1, false)?;

        let mut candidates: Vec<Handle> = Vec::new();
        match selectors {
            None => {
                for child in fragment.root().children.borrow().iter() {
                    Self::collect_blank(child, remove_br, &mut candidates);
                }
            }
            Some(selectors) => {
                for scope in fragment.query(&selectors).iter() {
                    let mut found = Vec::new();
                    Self::collect_blank(scope, remove_br, &mut found);
                    for candidate in found {
                        if !candidates.iter().any(|seen| Rc::ptr_eq(seen, &candidate)) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
        }

        let root = fragment.root();
        // Leaves first, so emptied parents are seen after their children are gone
        for node in candidates.iter().rev() {
            if Self::is_removable(node, root, remove_br) {
                detach_node(node);
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
    fn remove_drops_subtrees() {
        assert_eq!(
            run("<p>a<script>x</script></p><script>y</script>", &RemoveFilter, vec![json!("script")]),
            "<p>a</p>"
        );
    }

    #[test]
    fn only_flattens_matches_in_order() {
        assert_eq!(
            run(
                "<div><h2>a</h2><p>x</p></div><h2>b</h2><p>y</p>",
                &OnlyFilter,
                vec![json!("h2")]
            ),
            "<h2>a</h2><h2>b</h2>"
        );
        assert_eq!(run("<p>x</p>", &OnlyFilter, vec![json!("h2")]), "");
    }

    #[test]
    fn change_keeps_attributes_and_children() {
        assert_eq!(
            run(r#"<h1 class="t">Hi <b>there</b></h1>"#, &ChangeFilter, vec![json!("h1"), json!("h2")]),
            r#"<h2 class="t">Hi <b>there</b></h2>"#
        );
        assert_eq!(run("<b>hi</b>", &ChangeFilter, vec![json!("b"), json!(false)]), "hi");
        assert_eq!(run("<i></i>", &ChangeFilter, vec![json!("i"), json!("em")]), "<em></em>");
    }

    #[test]
    fn change_rejects_bad_tag_names() {
        let retcon = Retcon::default();
        let fragment = Fragment::parse("<b>x</b>");
        let result = ChangeFilter.apply(&retcon, &fragment, &[json!("b"), json!("not a tag")]);
        assert!(matches!(result, Err(RetconError::InvalidArgument { .. })));
    }

    #[test]
    fn wrap_uses_one_wrapper_per_node() {
        assert_eq!(
            run(
                "<span>a</span><span>b</span>",
                &WrapFilter,
                vec![json!("span"), json!("p.note")]
            ),
            r#"<p class="note"><span>a</span></p><p class="note"><span>b</span></p>"#
        );
        assert_eq!(
            run("<img>", &WrapFilter, vec![json!("img"), json!("#hero")]),
            r#"<div id="hero"><img></div>"#
        );
    }

    #[test]
    fn unwrap_removes_parent_once() {
        assert_eq!(
            run(
                "<div><p><span>a</span> <span>b</span></p></div>",
                &UnwrapFilter,
                vec![json!("span")]
            ),
            "<div><span>a</span> <span>b</span></div>"
        );
        // Top-level nodes have no parent to unwrap
        assert_eq!(run("<span>a</span>", &UnwrapFilter, vec![json!("span")]), "<span>a</span>");
    }

    #[test]
    fn inject_text_and_markup() {
        assert_eq!(
            run("<p>a</p>", &InjectFilter, vec![json!("p"), json!("b")]),
            "<p>ab</p>"
        );
        assert_eq!(
            run("<p>a</p>", &InjectFilter, vec![json!("p"), json!("<em>b</em>"), json!(true)]),
            "<p><em>b</em></p>"
        );
        assert_eq!(
            run("<p>a</p><p>c</p>", &InjectFilter, vec![json!("p"), json!("x & y"), json!(true)]),
            "<p>x &amp; y</p><p>x &amp; y</p>"
        );
    }

    #[test]
    fn remove_empty_defaults() {
        assert_eq!(
            run("<div><span>x</span><span></span></div>", &RemoveEmptyFilter, vec![]),
            "<div><span>x</span></div>"
        );
        assert_eq!(run("<p></p><p> </p>", &RemoveEmptyFilter, vec![]), "");
        assert_eq!(
            run(r#"<p><img src="a.png"></p><svg><g></g></svg>"#, &RemoveEmptyFilter, vec![]),
            r#"<p><img src="a.png"></p><svg><g></g></svg>"#
        );
        assert_eq!(run("<div><p></p></div>", &RemoveEmptyFilter, vec![]), "");
        assert_eq!(
            run("<p>&nbsp;</p><p>\n\t</p>", &RemoveEmptyFilter, vec![]),
            "<p>&nbsp;</p>"
        );
    }

    #[test]
    fn remove_empty_br_handling() {
        assert_eq!(run("a<br>b<p></p>", &RemoveEmptyFilter, vec![]), "a<br>b");
        assert_eq!(
            run("a<br>b<p></p>", &RemoveEmptyFilter, vec![json!(null), json!(true)]),
            "ab"
        );
    }

    #[test]
    fn remove_empty_scoped_by_selector() {
        assert_eq!(
            run("<div><p></p></div><section><p></p></section>", &RemoveEmptyFilter, vec![json!("div")]),
            "<section><p></p></section>"
        );
    }
}
