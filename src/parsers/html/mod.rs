//! HTML 片段解析和处理模块
//!
//! - `utils`: 基础常量与标签分类
//! - `dom`: 基础 DOM 操作（属性、节点增删、文本）
//! - `fragment`: 片段文档的解析、查询与序列化
//! - `serializer`: 序列化功能

pub mod dom;
pub mod fragment;
pub mod serializer;
pub mod utils;

pub use dom::{get_node_attr, get_node_name, get_parent_node, set_node_attr};
pub use fragment::{decode_html, Fragment, FRAGMENT_ROOT_TAG};
pub use serializer::serialize_children;
pub use utils::{is_opaque_element, is_void_element};
