use regex::Regex;
use std::sync::OnceLock;

/// 没有内容模型的空元素
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// 内容不透明的元素：即便没有文本也有意义，且不会深入其子树
pub const OPAQUE_ELEMENTS: &[&str] = &[
    "audio", "canvas", "iframe", "math", "object", "picture", "script", "svg", "template",
    "textarea", "video",
];

/// 检查是否为空元素
pub fn is_void_element(tag_name: &str) -> bool {
    VOID_ELEMENTS.contains(&tag_name.to_ascii_lowercase().as_str())
}

/// 检查是否为不透明元素
pub fn is_opaque_element(tag_name: &str) -> bool {
    OPAQUE_ELEMENTS.contains(&tag_name.to_ascii_lowercase().as_str())
}

/// 检查标签名是否可以用于创建元素
pub fn is_valid_tag_name(tag_name: &str) -> bool {
    let mut chars = tag_name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' || c == '.')
        }
        _ => false,
    }
}

/// 文本是否只由空白组成；只有空格、制表符和换行算作空白，`&nbsp;` 是可见文本
pub fn is_blank_text(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// 检查字符串是否包含类似标签的片段（`<...>`）
pub fn looks_like_markup(value: &str) -> bool {
    static MARKUP_RE: OnceLock<Regex> = OnceLock::new();
    MARKUP_RE
        .get_or_init(|| Regex::new(r"<[^<]+>").expect("static regex"))
        .is_match(value)
}
