//! 选择器解析与匹配
//!
//! 两种形式：
//!
//! - `parse_selector`：把 `tag`、`tag.class`、`tag#id` 这样的单个选择器解析为
//!   元素描述（用于 `wrap` 的包装元素）
//! - `query_selectors`：用 `selectors` 库解析并匹配 CSS 选择器列表，
//!   本模块只负责把 `markup5ever_rcdom` 节点接到它的 `Element` 接口上

use std::fmt;
use std::rc::Rc;

use cssparser::ToCss;
use html5ever::interface::QualName;
use html5ever::{namespace_url, ns, LocalName, Namespace};
use markup5ever_rcdom::{Handle, NodeData};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};

use crate::parsers::html::dom::{get_node_attr, get_parent_node, is_element};

/// 元素描述上的属性类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorAttribute {
    Id,
    Class,
}

impl DescriptorAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorAttribute::Id => "id",
            DescriptorAttribute::Class => "class",
        }
    }
}

/// 单个选择器解析出的元素描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub tag: String,
    pub attribute: Option<(DescriptorAttribute, String)>,
}

/// 解析单个选择器为元素描述
///
/// `#` 优先于 `.`，只按第一种出现的分隔符拆分；拆出多段时，
/// 第一段是标签，最后一段是属性值。
pub fn parse_selector(input: &str) -> ElementDescriptor {
    let selector_str: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    for (attribute, indicator) in [(DescriptorAttribute::Id, '#'), (DescriptorAttribute::Class, '.')] {
        if selector_str.contains(indicator) {
            let parts: Vec<&str> = selector_str.split(indicator).collect();
            let tag = if parts[0].is_empty() { "*" } else { parts[0] };
            let value = parts[parts.len() - 1];

            return ElementDescriptor {
                tag: tag.to_string(),
                attribute: if value.is_empty() {
                    None
                } else {
                    Some((attribute, value.to_string()))
                },
            };
        }
    }

    ElementDescriptor {
        tag: if selector_str.is_empty() {
            "*".to_string()
        } else {
            selector_str
        },
        attribute: None,
    }
}

/// 在 `root` 的后代中查询匹配选择器的元素，按文档顺序返回
///
/// 选择器数组会用逗号拼接为一个选择器列表；无法解析的选择器返回空结果。
/// `root` 本身不参与匹配，也不会作为任何元素的父元素出现。
pub fn query_selectors<S: AsRef<str>>(root: &Handle, selectors: &[S]) -> Vec<Handle> {
    let joined = selectors
        .iter()
        .map(|selector| selector.as_ref().trim())
        .filter(|selector| !selector.is_empty())
        .collect::<Vec<&str>>()
        .join(",");

    if joined.is_empty() {
        return Vec::new();
    }

    let mut input = cssparser::ParserInput::new(&joined);
    let mut parser = cssparser::Parser::new(&mut input);
    let list = match SelectorList::parse(&RetconParser, &mut parser, ParseRelative::No) {
        Ok(list) => list,
        Err(error) => {
            tracing::debug!("无法解析选择器 \"{}\": {:?}", joined, error.kind);
            return Vec::new();
        }
    };

    let mut caches = matching::SelectorCaches::default();
    let mut context = MatchingContext::new(
        matching::MatchingMode::Normal,
        None,
        &mut caches,
        matching::QuirksMode::NoQuirks,
        matching::NeedsSelectorFlags::No,
        matching::MatchingForInvalidation::No,
    );

    let mut found_nodes = Vec::new();
    collect_matches(root, root, &list, &mut context, &mut found_nodes);
    found_nodes
}

fn collect_matches(
    node: &Handle,
    root: &Handle,
    list: &SelectorList<RetconSelectors>,
    context: &mut MatchingContext<RetconSelectors>,
    found: &mut Vec<Handle>,
) {
    for child in node.children.borrow().iter() {
        if is_element(child) {
            let element = DomElement::new(child.clone(), root.clone());
            if matching::matches_selector_list(list, &element, context) {
                found.push(child.clone());
            }
            collect_matches(child, root, list, context, found);
        }
    }
}

/// 选择器实现：只支持标准的结构伪类，没有自定义伪类和伪元素
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetconSelectors;

impl parser::SelectorImpl for RetconSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssLocalName;
    type LocalName = CssLocalName;
    type NamespacePrefix = CssLocalName;
    type NamespaceUrl = Namespace;
    type BorrowedNamespaceUrl = Namespace;
    type BorrowedLocalName = CssLocalName;

    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

struct RetconParser;

impl<'i> parser::Parser<'i> for RetconParser {
    type Impl = RetconSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }
}

/// 属性值
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssString(pub String);

impl<'a> From<&'a str> for CssString {
    fn from(value: &'a str) -> Self {
        CssString(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// 标签名、类名和 id
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CssLocalName(pub LocalName);

impl<'a> From<&'a str> for CssLocalName {
    fn from(value: &'a str) -> Self {
        CssLocalName(LocalName::from(value))
    }
}

impl ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

impl PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NonTSPseudoClass {}

impl parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = RetconSelectors;

    fn is_active_or_hover(&self) -> bool {
        false
    }

    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = RetconSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

/// 供选择器匹配使用的元素句柄
///
/// 记住查询的根节点：根节点之外的祖先对选择器不可见。
#[derive(Clone, Debug)]
struct DomElement {
    node: Handle,
    root: Handle,
}

impl DomElement {
    fn new(node: Handle, root: Handle) -> Self {
        DomElement { node, root }
    }

    fn wrap(&self, node: Handle) -> Self {
        DomElement::new(node, self.root.clone())
    }

    fn qual_name(&self) -> Option<&QualName> {
        match &self.node.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// 同一父节点下的元素兄弟，以及自身在其中的位置
    fn element_siblings(&self) -> (Vec<Handle>, usize) {
        let Some(parent) = get_parent_node(&self.node) else {
            return (vec![self.node.clone()], 0);
        };
        let siblings: Vec<Handle> = parent
            .children
            .borrow()
            .iter()
            .filter(|child| is_element(child))
            .cloned()
            .collect();
        let index = siblings
            .iter()
            .position(|sibling| Rc::ptr_eq(sibling, &self.node))
            .unwrap_or(0);
        (siblings, index)
    }
}

impl Element for DomElement {
    type Impl = RetconSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&*self.node)
    }

    fn parent_element(&self) -> Option<Self> {
        get_parent_node(&self.node)
            .filter(|parent| is_element(parent) && !Rc::ptr_eq(parent, &self.root))
            .map(|parent| self.wrap(parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, index) = self.element_siblings();
        index
            .checked_sub(1)
            .and_then(|previous| siblings.get(previous).cloned())
            .map(|node| self.wrap(node))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, index) = self.element_siblings();
        siblings.get(index + 1).cloned().map(|node| self.wrap(node))
    }

    fn first_element_child(&self) -> Option<Self> {
        let child = self
            .node
            .children
            .borrow()
            .iter()
            .find(|child| is_element(child))
            .cloned();
        child.map(|node| self.wrap(node))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.qual_name().map_or(false, |name| name.ns == ns!(html))
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.qual_name()
            .map_or(false, |name| name.local == local_name.0)
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        self.qual_name().map_or(false, |name| name.ns == *namespace)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        match (self.qual_name(), other.qual_name()) {
            (Some(name), Some(other_name)) => name == other_name,
            _ => false,
        }
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        let NodeData::Element { attrs, .. } = &self.node.data else {
            return false;
        };
        let matched = attrs.borrow().iter().any(|attr| {
            !matches!(*ns, NamespaceConstraint::Specific(url) if *url != attr.name.ns)
                && attr.name.local == local_name.0
                && operation.eval_str(&attr.value)
        });
        matched
    }

    fn match_non_ts_pseudo_class(
        &self,
        pseudo_class: &NonTSPseudoClass,
        _context: &mut MatchingContext<RetconSelectors>,
    ) -> bool {
        match *pseudo_class {}
    }

    fn match_pseudo_element(
        &self,
        pseudo_element: &PseudoElement,
        _context: &mut MatchingContext<RetconSelectors>,
    ) -> bool {
        match *pseudo_element {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.qual_name()
            .map_or(false, |name| matches!(&*name.local, "a" | "area" | "link"))
            && get_node_attr(&self.node, "href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        get_node_attr(&self.node, "id")
            .map_or(false, |value| case_sensitivity.eq(value.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        get_node_attr(&self.node, "class").map_or(false, |value| {
            value
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.node.children.borrow().iter().any(|child| match &child.data {
            NodeData::Element { .. } => true,
            NodeData::Text { contents } => !contents.borrow().is_empty(),
            _ => false,
        })
    }

    /// 片段没有文档根元素
    fn is_root(&self) -> bool {
        false
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
