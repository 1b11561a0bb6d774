//! # 解析器模块
//!
//! - `html` - HTML 片段解析、DOM 操作、序列化
//! - `selector` - CSS 选择器匹配与 `tag#id`/`tag.class` 元素描述
//! - `xpath` - 简单的 XPath 位置路径

pub mod html;
pub mod selector;
pub mod xpath;

pub use html::Fragment;
pub use selector::{parse_selector, query_selectors, ElementDescriptor};
pub use xpath::query_xpath;
