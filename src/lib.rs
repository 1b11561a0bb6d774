//! # Retcon
//!
//! 对 HTML 片段按顺序执行一组具名过滤器：改标签、写属性、包裹/解包节点、
//! 删除空节点、生成响应式图片（`srcset`）、懒加载以及自动 alt 文本。
//!
//! ```no_run
//! use retcon::{FilterOp, Retcon};
//! use serde_json::json;
//!
//! let retcon = Retcon::default();
//! let html = retcon
//!     .run(
//!         "<p>Hello <script>x()</script><b>world</b></p>",
//!         &[
//!             FilterOp::new("remove", vec![json!("script")]),
//!             FilterOp::new("change", vec![json!("b"), json!("strong")]),
//!         ],
//!     )
//!     .unwrap();
//! assert_eq!(html.as_str(), "<p>Hello <strong>world</strong></p>");
//! ```
//!
//! ## 模块组织
//!
//! - `core` - 错误类型与过滤管道 `Retcon`
//! - `filters` - 过滤器注册表与全部内置过滤器
//! - `parsers` - HTML 片段、CSS 选择器、XPath
//! - `images` - 图片变换服务接口与本地实现
//! - `references` - 引用令牌解析
//! - `config` / `env` - 配置文件与环境变量
//! - `api` - 旧版调用入口（已弃用）
//! - `utils` - URL 与路径工具

pub mod api;
pub mod config;
pub mod core;
pub mod env;
pub mod filters;
pub mod images;
pub mod parsers;
pub mod references;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::RetconSettings;
pub use crate::core::{ErrorCategory, Markup, Retcon, RetconError, RetconResult};
pub use filters::{Filter, FilterOp, FilterRegistry};
pub use images::{ImageTransformer, LocalImageTransformer, TransformDescriptor, TransformedImage};
pub use parsers::Fragment;
pub use references::{
    NoopReferenceResolver, RefToken, ReferenceResolver, ReferencedEntity, StaticReferenceResolver,
};
