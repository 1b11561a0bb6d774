//! 图片变换
//!
//! 过滤器只关心变换后的 URL 和尺寸。真正的缩放可以交给外部服务
//! （实现 [`ImageTransformer`]），也可以由内置的 [`LocalImageTransformer`]
//! 在本地文件系统上完成。

mod local;

pub use local::LocalImageTransformer;

use base64::{engine::general_purpose::STANDARD, Engine};
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RetconSettings;
use crate::core::RetconResult;
use crate::parsers::html::dom::get_node_attr;
use crate::references::ReferenceResolver;
use crate::utils::url::{is_local_image, local_image_path, parse_image_url};

pub const DEFAULT_MODE: &str = "crop";
pub const DEFAULT_POSITION: &str = "center-center";

/// 变换参数
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDescriptor {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `crop`、`fit`，其他值按拉伸处理
    pub mode: Option<String>,
    pub position: Option<String>,
    pub quality: Option<u8>,
    pub format: Option<String>,
    /// 输出目录名，缺省时由其他参数生成
    pub handle: Option<String>,
}

impl TransformDescriptor {
    /// 用 `defaults` 补齐缺失的字段
    pub fn with_defaults(&self, defaults: Option<&TransformDescriptor>) -> TransformDescriptor {
        let Some(defaults) = defaults else {
            return self.clone();
        };

        TransformDescriptor {
            width: self.width.or(defaults.width),
            height: self.height.or(defaults.height),
            mode: self.mode.clone().or_else(|| defaults.mode.clone()),
            position: self.position.clone().or_else(|| defaults.position.clone()),
            quality: self.quality.or(defaults.quality),
            format: self.format.clone().or_else(|| defaults.format.clone()),
            handle: self.handle.clone().or_else(|| defaults.handle.clone()),
        }
    }

    pub fn mode(&self) -> &str {
        self.mode.as_deref().filter(|mode| !mode.is_empty()).unwrap_or(DEFAULT_MODE)
    }

    pub fn position(&self) -> &str {
        self.position
            .as_deref()
            .filter(|position| !position.is_empty())
            .unwrap_or(DEFAULT_POSITION)
    }

    /// 输出目录名：`handle`，或 `{w}x{h}_{mode}_{position}_{quality}`（缺失的尺寸写作 `AUTO`）
    pub fn handle_name(&self, default_quality: u8) -> String {
        if let Some(handle) = self.handle.as_deref().filter(|handle| !handle.is_empty()) {
            return handle.to_string();
        }

        let dimension = |value: Option<u32>| value.map_or_else(|| String::from("AUTO"), |v| v.to_string());
        format!(
            "{}x{}_{}_{}_{}",
            dimension(self.width),
            dimension(self.height),
            self.mode(),
            self.position(),
            self.quality.unwrap_or(default_quality)
        )
    }
}

/// 变换结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// 图片变换服务
pub trait ImageTransformer: Send + Sync {
    /// 按名称查找变换参数，默认实现不认识任何名称
    fn resolve_named_transform(&self, _name: &str) -> Option<TransformDescriptor> {
        None
    }

    /// 变换一张图片；`Ok(None)` 表示无法变换，节点保持不变
    fn transform_image(
        &self,
        src: &str,
        transform: &TransformDescriptor,
        defaults: Option<&TransformDescriptor>,
        overrides: Option<&Value>,
    ) -> RetconResult<Option<TransformedImage>>;
}

/// 指定尺寸的透明 SVG，base64 编码的 data URL
pub fn placeholder_pixel(width: u32, height: u32) -> String {
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 {} {}'/>",
        width, height
    );
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// 生成 `url1 400w, url2 800w` 形式的 srcset 值
pub fn srcset_attribute(images: &[TransformedImage], descriptor: &str) -> String {
    images
        .iter()
        .map(|image| format!("{} {}{}", image.url, image.width, descriptor))
        .collect::<Vec<String>>()
        .join(", ")
}

/// 读取 `width`/`height` 属性值开头的数字，`0` 视为缺失
pub fn parse_dimension(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|dimension| *dimension > 0)
}

/// 图片节点的尺寸
///
/// 优先使用节点上的 `width` 和 `height`，否则读取 `base_transform_path` 下的本地文件。
pub fn get_image_dimensions(
    node: &Handle,
    settings: &RetconSettings,
    resolver: &dyn ReferenceResolver,
) -> Option<(u32, u32)> {
    let width = get_node_attr(node, "width").as_deref().and_then(parse_dimension);
    let height = get_node_attr(node, "height").as_deref().and_then(parse_dimension);
    if let (Some(width), Some(height)) = (width, height) {
        return Some((width, height));
    }

    let src = get_node_attr(node, "src").filter(|src| !src.trim().is_empty())?;
    let base_path = settings.base_transform_path.as_deref()?;

    let image_url = parse_image_url(&resolver.parse_refs(&src));
    if !is_local_image(&image_url, settings.site_url.as_deref()) {
        return None;
    }

    let Some(path) = local_image_path(base_path, &image_url.path) else {
        tracing::debug!("skipping dimensions of {}: path leaves {}", src, base_path);
        return None;
    };
    match image::image_dimensions(&path) {
        Ok(dimensions) => Some(dimensions),
        Err(e) => {
            tracing::debug!("cannot read dimensions of {}: {}", path, e);
            None
        }
    }
}
