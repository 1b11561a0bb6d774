//! 图片类过滤器
//!
//! - `transform(transform, selector = "img", defaults, overrides)`
//! - `srcset(transforms, selector = "img", sizes = "100w", base64src = false, defaults, overrides)`
//! - `lazy(selector = "img", className = "lazyload", attributeName = "src")`
//! - `autoAlt(selector = "img", field = "title", overwrite = false)`
//! - `dimensions(selector = "img")`

use markup5ever_rcdom::Handle;
use serde_json::Value;

use crate::core::{Retcon, RetconResult};
use crate::images::{parse_dimension, placeholder_pixel, srcset_attribute, TransformDescriptor};
use crate::parsers::html::dom::{get_node_attr, set_node_attr};
use crate::parsers::html::Fragment;
use crate::references::RefToken;
use crate::utils::url::{file_stem, is_data_url, parse_image_url};

use super::attributes::add_class;
use super::{Filter, FilterArgs};

pub const DEFAULT_IMAGE_SELECTOR: &str = "img";
pub const DEFAULT_SIZES: &str = "100w";
pub const DEFAULT_LAZY_CLASS: &str = "lazyload";
pub const DEFAULT_LAZY_ATTRIBUTE: &str = "src";

/// 非空的 `src`
fn node_src(node: &Handle) -> Option<String> {
    get_node_attr(node, "src").filter(|src| !src.trim().is_empty())
}

fn node_dimension(node: &Handle, name: &str) -> Option<u32> {
    get_node_attr(node, name).as_deref().and_then(parse_dimension)
}

/// 节点上是否已有 `width` 或 `height`
fn has_any_dimension(node: &Handle) -> bool {
    node_dimension(node, "width").is_some() || node_dimension(node, "height").is_some()
}

fn set_dimensions(node: &Handle, (width, height): (u32, u32)) {
    set_node_attr(node, "width", Some(width.to_string()));
    set_node_attr(node, "height", Some(height.to_string()));
}

/// 读取内联的变换参数对象
fn descriptor_arg(args: &FilterArgs, index: usize) -> RetconResult<Option<TransformDescriptor>> {
    match args.object(index)? {
        None => Ok(None),
        Some(map) => serde_json::from_value(Value::Object(map.clone()))
            .map(Some)
            .map_err(|e| args.invalid_value(index, e.to_string())),
    }
}

/// `transform`：将 `src` 替换为变换后的地址，节点没有尺寸时补上
pub struct TransformFilter;

impl Filter for TransformFilter {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors_or(1, DEFAULT_IMAGE_SELECTOR)?;
        let defaults = descriptor_arg(&args, 2)?;
        let overrides = args.value(3);

        let nodes = fragment.query(&selectors);
        if nodes.is_empty() {
            return Ok(());
        }

        let Some(transform) = args.value(0).and_then(|value| retcon.resolve_transform(value)) else {
            tracing::debug!("transform: no usable transform given");
            return Ok(());
        };

        for node in nodes {
            let Some(src) = node_src(&node) else {
                continue;
            };

            let Some(image) = retcon.transform_image(&src, &transform, defaults.as_ref(), overrides)? else {
                continue;
            };

            set_node_attr(&node, "src", Some(image.url.clone()));

            if has_any_dimension(&node) {
                continue;
            }

            let dimensions = if image.width > 0 && image.height > 0 {
                Some((image.width, image.height))
            } else {
                retcon.image_dimensions(&node)
            };
            if let Some(dimensions) = dimensions {
                set_dimensions(&node, dimensions);
            }
        }

        Ok(())
    }
}

/// `srcset`：每个变换生成一个候选地址
pub struct SrcsetFilter;

impl SrcsetFilter {
    fn sizes(args: &FilterArgs) -> RetconResult<String> {
        let sizes = match args.value(2) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|size| !size.is_empty())
                .collect::<Vec<&str>>()
                .join(", "),
            _ => args.string(2)?.unwrap_or_default(),
        };

        if sizes.trim().is_empty() {
            Ok(DEFAULT_SIZES.to_string())
        } else {
            Ok(sizes)
        }
    }
}

impl Filter for SrcsetFilter {
    fn name(&self) -> &'static str {
        "srcset"
    }

    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors_or(1, DEFAULT_IMAGE_SELECTOR)?;
        let sizes = Self::sizes(&args)?;
        let base64src = args.bool(3, false)?;
        let defaults = descriptor_arg(&args, 4)?;
        let overrides = args.value(5);

        let nodes = fragment.query(&selectors);
        if nodes.is_empty() {
            return Ok(());
        }

        let transforms: Vec<TransformDescriptor> = match args.value(0) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| retcon.resolve_transform(item))
                .collect(),
            Some(value) => retcon.resolve_transform(value).into_iter().collect(),
            None => Vec::new(),
        };
        if transforms.is_empty() {
            tracing::debug!("srcset: no usable transforms given");
            return Ok(());
        }

        for node in nodes {
            let Some(src) = node_src(&node) else {
                continue;
            };

            let mut images = Vec::with_capacity(transforms.len());
            for transform in &transforms {
                if let Some(image) = retcon.transform_image(&src, transform, defaults.as_ref(), overrides)? {
                    images.push(image);
                }
            }
            if images.is_empty() {
                continue;
            }

            set_node_attr(&node, "srcset", Some(srcset_attribute(&images, "w")));
            set_node_attr(&node, "sizes", Some(sizes.clone()));
            set_node_attr(&node, "src", Some(retcon.parse_ref(&src)));

            let node_width = node_dimension(&node, "width");
            let node_height = node_dimension(&node, "height");
            if node_width.is_some() && node_height.is_some() && !base64src {
                continue;
            }

            let dimensions = retcon.image_dimensions(&node);
            if node_width.is_none() && node_height.is_none() {
                if let Some(dimensions) = dimensions {
                    set_dimensions(&node, dimensions);
                }
            }

            if base64src {
                let (width, height) = dimensions.unwrap_or((1, 1));
                set_node_attr(&node, "src", Some(placeholder_pixel(width, height)));
            }
        }

        Ok(())
    }
}

/// `lazy`：把地址移到 `data-*` 属性，`src` 换成占位图
pub struct LazyFilter;

impl Filter for LazyFilter {
    fn name(&self) -> &'static str {
        "lazy"
    }

    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors_or(0, DEFAULT_IMAGE_SELECTOR)?;
        let class_name = match args.value(1) {
            None => DEFAULT_LAZY_CLASS.to_string(),
            Some(_) => args.string(1)?.unwrap_or_default(),
        };
        let attribute_name = args
            .string(2)?
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_LAZY_ATTRIBUTE.to_string());
        let data_attribute = format!("data-{}", attribute_name);

        for node in fragment.query(&selectors) {
            if !class_name.trim().is_empty() {
                add_class(&node, &class_name);
            }

            let src = get_node_attr(&node, "src").unwrap_or_default();
            set_node_attr(&node, &data_attribute, Some(retcon.parse_ref(&src)));

            let dimensions = retcon.image_dimensions(&node);
            if let Some(dimensions) = dimensions {
                if !has_any_dimension(&node) {
                    set_dimensions(&node, dimensions);
                }
            }

            let (width, height) = dimensions.unwrap_or((1, 1));
            set_node_attr(&node, "src", Some(placeholder_pixel(width, height)));
        }

        Ok(())
    }
}

/// `autoAlt`：按引用目标的字段、标题、文件名依次取 alt
pub struct AutoAltFilter;

impl AutoAltFilter {
    fn alt_for(retcon: &Retcon, src: &str, field: &str) -> Option<String> {
        let entity = RefToken::parse(src).and_then(|token| retcon.resolver().resolve_ref_to_entity(&token));
        if let Some(alt) = entity.and_then(|entity| entity.field(field).or_else(|| entity.field("title"))) {
            return Some(alt);
        }

        if !retcon.settings().alt_from_filename {
            return None;
        }

        let url = retcon.parse_ref(src);
        if RefToken::parse(&url).is_some() {
            return None;
        }
        file_stem(&parse_image_url(&url).path)
    }
}

impl Filter for AutoAltFilter {
    fn name(&self) -> &'static str {
        "autoAlt"
    }

    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors_or(0, DEFAULT_IMAGE_SELECTOR)?;
        let field = args
            .string(1)?
            .filter(|field| !field.trim().is_empty())
            .unwrap_or_else(|| "title".to_string());
        let overwrite = args.bool(2, false)?;

        for node in fragment.query(&selectors) {
            let has_alt = get_node_attr(&node, "alt").map_or(false, |alt| !alt.is_empty());
            if has_alt && !overwrite {
                continue;
            }

            let Some(src) = node_src(&node) else {
                continue;
            };
            if is_data_url(&src) {
                continue;
            }

            if let Some(alt) = Self::alt_for(retcon, &src, &field) {
                set_node_attr(&node, "alt", Some(alt));
            }
        }

        Ok(())
    }
}

/// `dimensions`：为缺少尺寸的图片补上 `width`/`height`
pub struct DimensionsFilter;

impl Filter for DimensionsFilter {
    fn name(&self) -> &'static str {
        "dimensions"
    }

    fn apply(&self, retcon: &Retcon, fragment: &Fragment, args: &[Value]) -> RetconResult<()> {
        let args = FilterArgs::new(self.name(), args);
        let selectors = args.selectors_or(0, DEFAULT_IMAGE_SELECTOR)?;

        for node in fragment.query(&selectors) {
            if has_any_dimension(&node) {
                continue;
            }
            if let Some(dimensions) = retcon.image_dimensions(&node) {
                set_dimensions(&node, dimensions);
            }
        }

        Ok(())
    }
}
