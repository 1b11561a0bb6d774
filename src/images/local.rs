//! 本地图片变换
//!
//! 源文件为 `<base_transform_path><url 路径>`，输出写入同目录下的
//! `_<handle>/<文件名>.<扩展名>`，已存在时直接复用。

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde_json::Value;

use crate::config::RetconSettings;
use crate::core::{RetconError, RetconResult};
use crate::utils::url::{
    dir_name, file_extension, file_stem, fix_slashes, is_local_image, normalize_path,
    parse_image_url,
};

use super::{ImageTransformer, TransformDescriptor, TransformedImage};

/// 允许变换的扩展名
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Clone, Debug, Default)]
pub struct LocalImageTransformer {
    base_path: Option<String>,
    base_url: Option<String>,
    site_url: Option<String>,
    default_quality: u8,
}

impl LocalImageTransformer {
    pub fn from_settings(settings: &RetconSettings) -> Self {
        LocalImageTransformer {
            base_path: settings.base_transform_path.clone(),
            base_url: settings.base_transform_url.clone(),
            site_url: settings.site_url.clone(),
            default_quality: settings.default_image_quality,
        }
    }

    fn required<'a>(value: &'a Option<String>, setting: &str) -> RetconResult<&'a str> {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                RetconError::Configuration(format!(
                    "{} must be set to transform local images",
                    setting
                ))
            })
    }

    /// 站点与输出地址不同源，或源地址本身是绝对地址时输出绝对 URL
    fn uses_absolute_url(&self, base_url: &str, image_url: &str) -> bool {
        let site_url = self.site_url.as_deref().unwrap_or_default();
        base_url.trim_end_matches('/') != site_url.trim_end_matches('/') || image_url.contains("http")
    }
}

/// 缺失的一边按原图比例计算
fn target_size(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (source_width, source_height) = (source.0.max(1) as f64, source.1.max(1) as f64);
    match (width, height) {
        (Some(width), Some(height)) => (width, height),
        (Some(width), None) => (width, ((width as f64) * source_height / source_width).round().max(1.0) as u32),
        (None, Some(height)) => (((height as f64) * source_width / source_height).round().max(1.0) as u32, height),
        (None, None) => source,
    }
}

/// 裁剪区域在剩余空间中的偏移，`position` 形如 `top-left`、`center-center`
fn crop_offset(position: &str, excess_x: u32, excess_y: u32) -> (u32, u32) {
    let mut parts = position.split('-');
    let vertical = parts.next().unwrap_or("center");
    let horizontal = parts.next().unwrap_or("center");

    let x = match horizontal {
        "left" => 0,
        "right" => excess_x,
        _ => excess_x / 2,
    };
    let y = match vertical {
        "top" => 0,
        "bottom" => excess_y,
        _ => excess_y / 2,
    };
    (x, y)
}

fn scale_and_crop(image: &DynamicImage, width: u32, height: u32, position: &str) -> DynamicImage {
    let scale = f64::max(
        width as f64 / image.width().max(1) as f64,
        height as f64 / image.height().max(1) as f64,
    );
    let scaled_width = ((image.width() as f64 * scale).ceil() as u32).max(width);
    let scaled_height = ((image.height() as f64 * scale).ceil() as u32).max(height);
    let scaled = image.resize_exact(scaled_width, scaled_height, FilterType::Lanczos3);

    let (x, y) = crop_offset(position, scaled_width - width, scaled_height - height);
    scaled.crop_imm(x, y, width, height)
}

fn render(image: &DynamicImage, transform: &TransformDescriptor) -> DynamicImage {
    let (width, height) = target_size(image.dimensions(), transform.width, transform.height);
    match transform.mode() {
        "crop" => scale_and_crop(image, width, height, transform.position()),
        "fit" => image.resize(width, height, FilterType::Lanczos3),
        _ => image.resize_exact(width, height, FilterType::Lanczos3),
    }
}

fn save(image: &DynamicImage, path: &Path, extension: &str, quality: u8) -> RetconResult<()> {
    match extension {
        "jpg" | "jpeg" => {
            let file = fs::File::create(path)?;
            let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
            encoder
                .encode_image(&image.to_rgb8())
                .map_err(|e| RetconError::Io(std::io::Error::other(e)))
        }
        other => {
            let format = ImageFormat::from_extension(other).ok_or_else(|| {
                RetconError::Io(std::io::Error::other(format!("unsupported image format {}", other)))
            })?;
            image
                .save_with_format(path, format)
                .map_err(|e| RetconError::Io(std::io::Error::other(e)))
        }
    }
}

impl ImageTransformer for LocalImageTransformer {
    fn transform_image(
        &self,
        src: &str,
        transform: &TransformDescriptor,
        defaults: Option<&TransformDescriptor>,
        _overrides: Option<&Value>,
    ) -> RetconResult<Option<TransformedImage>> {
        let transform = transform.with_defaults(defaults);
        let image_url = parse_image_url(src);

        let Some(extension) = file_extension(&image_url.path)
            .filter(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str()))
        else {
            tracing::debug!("skipping {}: unsupported extension", src);
            return Ok(None);
        };

        if !is_local_image(&image_url, self.site_url.as_deref()) {
            tracing::debug!("skipping {}: not a local image", src);
            return Ok(None);
        }

        let base_path = fix_slashes(Self::required(&self.base_path, "base_transform_path")?);
        let base_path = base_path.trim_end_matches('/');
        let base_url = Self::required(&self.base_url, "base_transform_url")?;

        let Some(image_path) = normalize_path(&image_url.path) else {
            tracing::debug!("skipping {}: path leaves {}", src, base_path);
            return Ok(None);
        };
        let source_path = fix_slashes(&format!("{}{}", base_path, image_path));
        if !Path::new(&source_path).is_file() {
            tracing::debug!("skipping {}: {} does not exist", src, source_path);
            return Ok(None);
        }

        let output_extension = transform
            .format
            .as_deref()
            .filter(|format| !format.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or(extension);
        let stem = file_stem(&image_path).unwrap_or_default();
        let quality = transform.quality.unwrap_or(self.default_quality);

        let folder = fix_slashes(&format!(
            "{}{}/_{}",
            base_path,
            dir_name(&image_path),
            transform.handle_name(self.default_quality)
        ));
        let output_path = fix_slashes(&format!("{}/{}.{}", folder, stem, output_extension));

        let (width, height) = if Path::new(&output_path).is_file() {
            match image::image_dimensions(&output_path) {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    tracing::warn!("cannot read {}: {}", output_path, e);
                    return Ok(None);
                }
            }
        } else {
            let source = match image::open(&source_path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("cannot load {}: {}", source_path, e);
                    return Ok(None);
                }
            };

            let rendered = render(&source, &transform);
            let written = fs::create_dir_all(&folder)
                .map_err(RetconError::from)
                .and_then(|_| save(&rendered, Path::new(&output_path), &output_extension, quality));
            if let Err(e) = written {
                tracing::warn!("cannot write {}: {}", output_path, e);
                return Ok(None);
            }
            tracing::info!("transformed {} -> {}", source_path, output_path);
            rendered.dimensions()
        };

        let prefix = if self.uses_absolute_url(base_url, src) {
            base_url
        } else {
            ""
        };
        let url = fix_slashes(&output_path.replacen(base_path, &format!("{}/", prefix), 1));

        Ok(Some(TransformedImage { url, width, height }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn settings(root: &Path) -> RetconSettings {
        RetconSettings {
            base_transform_path: Some(root.to_string_lossy().into_owned()),
            base_transform_url: Some("https://cdn.example.com".to_string()),
            site_url: Some("https://example.com".to_string()),
            ..Default::default()
        }
    }

    fn write_source(root: &Path) {
        fs::create_dir_all(root.join("uploads")).unwrap();
        RgbImage::from_pixel(200, 100, Rgb([200, 10, 10]))
            .save(root.join("uploads/photo.png"))
            .unwrap();
    }

    #[test]
    fn crops_into_handle_folder() {
        let root = tempfile::tempdir().unwrap();
        write_source(root.path());
        let transformer = LocalImageTransformer::from_settings(&settings(root.path()));

        let transform = TransformDescriptor {
            width: Some(50),
            height: Some(50),
            ..Default::default()
        };
        let image = transformer
            .transform_image("/uploads/photo.png", &transform, None, None)
            .unwrap()
            .unwrap();

        assert_eq!(
            image.url,
            "https://cdn.example.com/uploads/_50x50_crop_center-center_90/photo.png"
        );
        assert_eq!((image.width, image.height), (50, 50));
        assert!(root
            .path()
            .join("uploads/_50x50_crop_center-center_90/photo.png")
            .is_file());

        // 第二次直接复用已生成的文件
        let again = transformer
            .transform_image("/uploads/photo.png", &transform, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(again, image);
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        let root = tempfile::tempdir().unwrap();
        write_source(root.path());
        let transformer = LocalImageTransformer::from_settings(&settings(root.path()));

        let transform = TransformDescriptor {
            width: Some(100),
            height: Some(100),
            mode: Some("fit".to_string()),
            format: Some("jpg".to_string()),
            ..Default::default()
        };
        let image = transformer
            .transform_image("/uploads/photo.png", &transform, None, None)
            .unwrap()
            .unwrap();
        assert_eq!((image.width, image.height), (100, 50));
        assert!(image.url.ends_with("/_100x100_fit_center-center_90/photo.jpg"));
    }

    #[test]
    fn skips_remote_and_unsupported_sources() {
        let root = tempfile::tempdir().unwrap();
        let transformer = LocalImageTransformer::from_settings(&settings(root.path()));
        let transform = TransformDescriptor::default();

        assert_eq!(
            transformer
                .transform_image("https://elsewhere.org/a.jpg", &transform, None, None)
                .unwrap(),
            None
        );
        assert_eq!(
            transformer.transform_image("/a.svg", &transform, None, None).unwrap(),
            None
        );
        assert_eq!(
            transformer.transform_image("/missing.jpg", &transform, None, None).unwrap(),
            None
        );
    }

    #[test]
    fn paths_cannot_leave_the_base() {
        let outer = tempfile::tempdir().unwrap();
        let base = outer.path().join("site");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(outer.path().join("secret")).unwrap();
        RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]))
            .save(outer.path().join("secret/p.png"))
            .unwrap();
        let transformer = LocalImageTransformer::from_settings(&settings(&base));
        let transform = TransformDescriptor {
            width: Some(5),
            height: Some(5),
            ..Default::default()
        };

        for src in ["/../secret/p.png", "../secret/p.png", "/img/%2E%2E/../secret/p.png"] {
            assert_eq!(transformer.transform_image(src, &transform, None, None).unwrap(), None, "{}", src);
        }
        assert!(!outer.path().join("secret/_5x5_crop_center-center_90").exists());
    }

    #[test]
    fn missing_base_settings_are_reported() {
        let transformer = LocalImageTransformer::from_settings(&RetconSettings::default());
        let error = transformer
            .transform_image("/a.jpg", &TransformDescriptor::default(), None, None)
            .unwrap_err();
        assert!(error.to_string().contains("base_transform_path"));
    }

    #[test]
    fn crop_offsets() {
        assert_eq!(crop_offset("top-left", 10, 20), (0, 0));
        assert_eq!(crop_offset("center-center", 10, 20), (5, 10));
        assert_eq!(crop_offset("bottom-right", 10, 20), (10, 20));
        assert_eq!(target_size((200, 100), Some(50), None), (50, 25));
    }
}
