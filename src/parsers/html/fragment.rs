//! HTML 片段文档
//!
//! 将任意（可能不完整、不合法的）HTML 字符串按 HTML 片段解析算法解析为可变的 DOM 树。
//! 解析上下文由片段顶层的全部元素决定：只有表格结构元素需要表格类上下文，
//! 其余内容一律在 `<body>` 上下文中解析，保持原有顺序。
//! 解析结果被移入一个合成根节点，序列化时只输出它的子节点，
//! `<html>`/`<head>`/`<body>` 与 doctype 从结构上就不会出现在结果中。

use std::sync::OnceLock;

use encoding_rs::Encoding;
use html5ever::interface::QualName;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{namespace_url, ns, parse_fragment, LocalName, ParseOpts};
use markup5ever_rcdom::{Handle, RcDom};
use regex::Regex;

use crate::core::RetconResult;
use crate::parsers::selector::query_selectors;
use crate::parsers::xpath::query_xpath;

use super::dom::{append_children, create_element, get_child_node_by_name, take_children};
use super::serializer::serialize_children;
use super::utils::is_void_element;

/// 合成根节点的标签名
pub const FRAGMENT_ROOT_TAG: &str = "retcon-fragment";

/// 内容可能包含 `<` 的原始文本元素
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "plaintext", "script", "style", "textarea",
    "title", "xmp",
];

/// 解析上下文，按能容纳的表格层级从低到高排列
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum FragmentContext {
    Body,
    TableRow,
    TableBody,
    Table,
    ColumnGroup,
}

impl FragmentContext {
    /// 单元格需要 `<tr>`，行需要 `<tbody>`，表格分区需要 `<table>`；
    /// 列组上下文会丢弃 `<col>` 以外的一切，所以只在顶层全是 `<col>` 时使用
    fn detect(html: &str) -> Self {
        let names = top_level_elements(html);

        if !names.is_empty() && names.iter().all(|name| name == "col") {
            return FragmentContext::ColumnGroup;
        }

        names
            .iter()
            .filter_map(|name| match name.as_str() {
                "td" | "th" => Some(FragmentContext::TableRow),
                "tr" => Some(FragmentContext::TableBody),
                "tbody" | "thead" | "tfoot" | "caption" | "colgroup" | "col" => {
                    Some(FragmentContext::Table)
                }
                _ => None,
            })
            .max()
            .unwrap_or(FragmentContext::Body)
    }

    fn element_name(&self) -> QualName {
        let local = match self {
            FragmentContext::Body => "body",
            FragmentContext::TableRow => "tr",
            FragmentContext::TableBody => "tbody",
            FragmentContext::Table => "table",
            FragmentContext::ColumnGroup => "colgroup",
        };
        QualName::new(None, ns!(html), LocalName::from(local))
    }
}

/// 按出现顺序列出片段顶层元素的标签名（小写）
///
/// 只做粗略的标签扫描：注释与原始文本元素的内容被跳过，
/// 未闭合的单元格、行和表格分区按 HTML 的隐式闭合规则处理。
fn top_level_elements(html: &str) -> Vec<String> {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let tag_re = TAG_RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<!--.*?-->|<![^>]*>|<(?P<end>/)?(?P<name>[A-Za-z][A-Za-z0-9-]*)(?:[^>"']|"[^"]*"|'[^']*')*>"#,
        )
        .expect("static regex")
    });

    let mut names = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut position = 0;

    while let Some(captures) = tag_re.captures_at(html, position) {
        let Some(tag) = captures.get(0) else { break };
        position = tag.end();

        let Some(name) = captures.name("name") else {
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();

        if captures.name("end").is_some() {
            if let Some(index) = open.iter().rposition(|open_name| *open_name == name) {
                open.truncate(index);
            }
            continue;
        }

        if let Some(index) = implied_close(&open, &name) {
            open.truncate(index);
        }
        if open.is_empty() {
            names.push(name.clone());
        }
        if is_void_element(&name) {
            continue;
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let closing = format!("</{}", name);
            match html[position..].to_ascii_lowercase().find(&closing) {
                Some(offset) => position += offset,
                None => break,
            }
            continue;
        }

        open.push(name);
    }

    names
}

/// 新开的表格元素会隐式闭合同一张表里仍然打开的同级元素
fn implied_close(open: &[String], name: &str) -> Option<usize> {
    let closes: &[&str] = match name {
        "td" | "th" => &["td", "th"],
        "tr" => &["tr"],
        "tbody" | "thead" | "tfoot" => &["tbody", "thead", "tfoot"],
        _ => return None,
    };

    let start = open
        .iter()
        .rposition(|open_name| open_name == "table")
        .map_or(0, |index| index + 1);
    open[start..]
        .iter()
        .position(|open_name| closes.contains(&open_name.as_str()))
        .map(|index| start + index)
}

/// 按字符集标签（如 `windows-1252`）解码；无法识别的标签按 UTF-8 处理
pub fn decode_html(data: &[u8], document_encoding: &str) -> String {
    if let Some(encoding) = Encoding::for_label(document_encoding.trim().as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}

/// 已解析的 HTML 片段
///
/// 一次顶层调用只解析一次；同一管道中的所有过滤器都在这棵活动的树上原地修改。
pub struct Fragment {
    root: Handle,
}

impl Fragment {
    /// 解析 UTF-8 HTML 片段，解析错误会被静默吞掉
    pub fn parse(html: &str) -> Fragment {
        let context = FragmentContext::detect(html);

        let opts = ParseOpts {
            tree_builder: TreeBuilderOpts {
                scripting_enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let dom = parse_fragment(RcDom::default(), opts, context.element_name(), vec![]).one(html);

        // 片段解析器把结果放在文档下唯一的 <html> 元素里
        let root = create_element(FRAGMENT_ROOT_TAG, vec![]);
        if let Some(html_element) = get_child_node_by_name(&dom.document, "html") {
            append_children(&root, take_children(&html_element));
        }

        Fragment { root }
    }

    /// 按指定字符集解码字节后再解析
    pub fn from_bytes(data: &[u8], document_encoding: &str) -> Fragment {
        Fragment::parse(&decode_html(data, document_encoding))
    }

    /// 合成根节点；它本身永远不会被查询到，也不会被序列化
    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// 用 CSS 选择器（或选择器列表）查询元素，结果按文档顺序排列
    pub fn query<S: AsRef<str>>(&self, selectors: &[S]) -> Vec<Handle> {
        query_selectors(&self.root, selectors)
    }

    /// 用 XPath 位置路径查询元素，`/` 指向合成根节点
    pub fn query_xpath(&self, expression: &str) -> Vec<Handle> {
        query_xpath(&self.root, expression)
    }

    /// 用一组节点替换片段的全部内容
    pub fn replace_contents(&self, nodes: Vec<Handle>) {
        drop(take_children(&self.root));
        append_children(&self.root, nodes);
    }

    /// 片段是否还有任何内容
    pub fn is_empty(&self) -> bool {
        self.root.children.borrow().is_empty()
    }

    /// 序列化为 HTML 字符串
    pub fn serialize(&self) -> RetconResult<String> {
        Ok(serialize_children(&self.root)?)
    }
}
