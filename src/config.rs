//! 配置
//!
//! 加载顺序：`.env` 文件、配置文件（显式路径或 [`CONFIG_PATHS`] 中第一个存在的文件）、
//! 环境变量覆盖，最后校验。配置以值的形式传给 `Retcon::new`，没有全局单例。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{RetconError, RetconResult};
use crate::images::TransformDescriptor;
use crate::references::ReferencedEntity;

/// 默认查找的配置文件
pub const CONFIG_PATHS: &[&str] = &[
    "retcon.toml",
    "config/retcon.toml",
    "~/.config/retcon/retcon.toml",
];

pub const DEFAULT_IMAGE_QUALITY: u8 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetconSettings {
    /// 本地图片根目录
    pub base_transform_path: Option<String>,
    /// 与根目录对应的公开 URL
    pub base_transform_url: Option<String>,
    /// 站点 URL，用于判断图片是否为本站资源
    pub site_url: Option<String>,
    /// 已注册外部图片服务时交给它处理
    pub use_image_service: bool,
    pub default_image_quality: u8,
    /// 在输出中解析引用令牌
    pub parse_refs: bool,
    /// 允许用文件名作为 alt 文本的最后手段
    pub alt_from_filename: bool,
    /// 缓存命名变换的查找结果
    pub cache_named_transforms: bool,
    /// 命名变换
    pub transforms: BTreeMap<String, TransformDescriptor>,
    /// 静态引用表
    pub references: Vec<ReferencedEntity>,
}

impl Default for RetconSettings {
    fn default() -> Self {
        Self {
            base_transform_path: None,
            base_transform_url: None,
            site_url: None,
            use_image_service: true,
            default_image_quality: DEFAULT_IMAGE_QUALITY,
            parse_refs: true,
            alt_from_filename: true,
            cache_named_transforms: true,
            transforms: BTreeMap::new(),
            references: Vec::new(),
        }
    }
}

impl RetconSettings {
    /// 加载配置
    ///
    /// `path` 为空时依次查找 `RETCON_CONFIG` 与 [`CONFIG_PATHS`]，都不存在则使用默认值。
    pub fn load(path: Option<&str>) -> RetconResult<Self> {
        use crate::env::EnvVar;

        Self::load_dotenv();

        let explicit = path.map(str::to_string).or_else(crate::env::general::ConfigPath::get_override);
        let mut settings = match explicit {
            Some(path) => {
                let expanded = shellexpand::tilde(&path).into_owned();
                tracing::info!("加载配置文件: {}", expanded);
                Self::from_file(&expanded)?
            }
            None => Self::load_from_search_paths()?,
        };

        settings.apply_env_overrides();
        settings.expand_paths();
        settings.validate()?;

        Ok(settings)
    }

    fn load_from_search_paths() -> RetconResult<Self> {
        for path in CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::from_file(&expanded_path);
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok(Self::default())
    }

    /// 从指定文件加载配置；`.toml` 结尾按 TOML 解析，否则按 JSON 解析
    pub fn from_file(path: &str) -> RetconResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetconError::Configuration(format!("cannot read settings file {}: {}", path, e))
        })?;

        if path.ends_with(".toml") {
            toml::from_str(&content).map_err(|e| {
                RetconError::Configuration(format!("cannot parse TOML settings {}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                RetconError::Configuration(format!("cannot parse JSON settings {}: {}", path, e))
            })
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{images, output, EnvVar};

        if let Some(path) = images::BaseTransformPath::get_override() {
            self.base_transform_path = Some(path);
        }

        if let Some(url) = images::BaseTransformUrl::get_override() {
            self.base_transform_url = Some(url);
        }

        if let Some(url) = images::SiteUrl::get_override() {
            tracing::info!("环境变量覆盖站点 URL: {}", url);
            self.site_url = Some(url);
        }

        if let Some(enabled) = images::UseImageService::get_override() {
            self.use_image_service = enabled;
        }

        if let Some(quality) = images::DefaultImageQuality::get_override() {
            self.default_image_quality = quality;
        }

        if let Some(enabled) = output::ParseRefs::get_override() {
            self.parse_refs = enabled;
        }
    }

    /// 展开路径中的 `~` 与环境变量
    fn expand_paths(&mut self) {
        if let Some(path) = self.base_transform_path.take() {
            let expanded = shellexpand::full(&path)
                .map(|expanded| expanded.into_owned())
                .unwrap_or_else(|e| {
                    tracing::warn!("cannot expand {}: {}", path, e);
                    path.clone()
                });
            self.base_transform_path = Some(expanded);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> RetconResult<()> {
        if !(1..=100).contains(&self.default_image_quality) {
            return Err(RetconError::Configuration(format!(
                "default_image_quality must be between 1 and 100, got {}",
                self.default_image_quality
            )));
        }

        for (name, transform) in &self.transforms {
            if let Some(quality) = transform.quality {
                if !(1..=100).contains(&quality) {
                    return Err(RetconError::Configuration(format!(
                        "transform \"{}\" has quality {} outside 1-100",
                        name, quality
                    )));
                }
            }
        }

        for (setting, value) in [
            ("site_url", &self.site_url),
            ("base_transform_url", &self.base_transform_url),
        ] {
            if let Some(value) = value.as_deref().filter(|value| value.contains("://")) {
                url::Url::parse(value).map_err(|e| {
                    RetconError::Configuration(format!("{} is not a valid URL: {}", setting, e))
                })?;
            }
        }

        Ok(())
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> RetconResult<()> {
        let mut settings = Self::default();
        settings.base_transform_path = Some("/var/www/public".to_string());
        settings.base_transform_url = Some("https://example.com".to_string());
        settings.site_url = Some("https://example.com".to_string());
        settings.transforms.insert(
            "thumb".to_string(),
            TransformDescriptor {
                width: Some(400),
                height: Some(300),
                mode: Some("crop".to_string()),
                ..Default::default()
            },
        );

        let content = toml::to_string_pretty(&settings)
            .map_err(|e| RetconError::Configuration(format!("cannot serialize settings: {}", e)))?;
        std::fs::write(path, content)?;

        Ok(())
    }
}
