//! # 工具模块
//!
//! - `url` - 图片地址解析、本地路径映射、斜杠清理

pub mod url;

pub use url::{fix_slashes, is_data_url, parse_image_url, ImageUrl, Url};
