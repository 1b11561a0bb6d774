// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use serde_json::Value;

use retcon::{
    FilterOp, ImageTransformer, Retcon, RetconResult, RetconSettings, TransformDescriptor,
    TransformedImage,
};

/// 执行单个过滤器并返回字符串结果
pub fn apply(retcon: &Retcon, html: &str, name: &str, args: Vec<Value>) -> String {
    retcon
        .apply(html, name, args)
        .unwrap_or_else(|e| panic!("filter {} failed: {}", name, e))
        .into_string()
}

/// 执行 JSON 形式的管道
pub fn run_json(retcon: &Retcon, html: &str, ops: Value) -> String {
    let ops = FilterOp::parse_ops(&ops).expect("valid ops");
    retcon.run(html, &ops).expect("pipeline succeeds").into_string()
}

/// 统计子串出现次数
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// 按命名规则 `w<宽度>` 工作的假图片服务，输出 `url<宽度>`，高度为宽度的一半
pub struct WidthImageService;

impl ImageTransformer for WidthImageService {
    fn resolve_named_transform(&self, name: &str) -> Option<TransformDescriptor> {
        let width = name.strip_prefix('w')?.parse().ok()?;
        Some(TransformDescriptor {
            width: Some(width),
            ..Default::default()
        })
    }

    fn transform_image(
        &self,
        src: &str,
        transform: &TransformDescriptor,
        _defaults: Option<&TransformDescriptor>,
        _overrides: Option<&Value>,
    ) -> RetconResult<Option<TransformedImage>> {
        if src.ends_with(".svg") {
            return Ok(None);
        }
        Ok(transform.width.map(|width| TransformedImage {
            url: format!("url{}", width),
            width,
            height: width / 2,
        }))
    }
}

/// 使用假图片服务的实例
pub fn retcon_with_service() -> Retcon {
    Retcon::default().with_image_service(WidthImageService)
}

/// 指向临时目录的本地变换配置
pub fn local_settings(root: &Path) -> RetconSettings {
    RetconSettings {
        base_transform_path: Some(root.to_string_lossy().into_owned()),
        base_transform_url: Some("https://cdn.example.com".to_string()),
        site_url: Some("https://example.com".to_string()),
        ..Default::default()
    }
}

/// 在 `root` 下写入一张纯色 PNG
pub fn write_png(root: &Path, relative: &str, width: u32, height: u32) {
    let path = root.join(relative.trim_start_matches('/'));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb([30, 120, 200]))
        .save(&path)
        .unwrap();
}
