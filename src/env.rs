//! 统一的环境变量管理系统
//!
//! 每个变量是一个实现 [`EnvVar`] 的零大小类型，带名称、默认值、说明和解析规则。
//! 配置文件中的值可以被这里的变量覆盖（见 `RetconSettings::apply_env_overrides`）。

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }

    /// 仅在变量被设置时返回值；值无法解析时记录警告并忽略
    fn get_override() -> Option<T> {
        let value = env::var(Self::NAME).ok()?;
        match Self::parse(&value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

/// 通用环境变量定义
pub mod general {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "RETCON_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.trim().to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                }),
            }
        }
    }

    /// 配置文件路径
    pub struct ConfigPath;
    impl EnvVar<String> for ConfigPath {
        const NAME: &'static str = "RETCON_CONFIG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the settings file (TOML or JSON)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }
}

/// 图片相关环境变量
pub mod images {
    use super::*;

    /// 本地图片根目录
    pub struct BaseTransformPath;
    impl EnvVar<String> for BaseTransformPath {
        const NAME: &'static str = "RETCON_BASE_TRANSFORM_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Filesystem root that local image URLs are resolved against";

        fn parse(value: &str) -> EnvResult<String> {
            let value = parse_non_empty(value, Self::NAME)?;
            Ok(shellexpand::tilde(&value).into_owned())
        }
    }

    /// 本地图片根目录对应的公开 URL
    pub struct BaseTransformUrl;
    impl EnvVar<String> for BaseTransformUrl {
        const NAME: &'static str = "RETCON_BASE_TRANSFORM_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Public URL that serves RETCON_BASE_TRANSFORM_PATH";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 站点 URL
    pub struct SiteUrl;
    impl EnvVar<String> for SiteUrl {
        const NAME: &'static str = "RETCON_SITE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Site URL; absolute image URLs on other hosts are not transformed";

        fn parse(value: &str) -> EnvResult<String> {
            let value = parse_non_empty(value, Self::NAME)?;
            url::Url::parse(&value).map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid URL '{}': {}", value, e),
            })?;
            Ok(value)
        }
    }

    /// 是否交给外部图片服务
    pub struct UseImageService;
    impl EnvVar<bool> for UseImageService {
        const NAME: &'static str = "RETCON_USE_IMAGE_SERVICE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Delegate transforms to a registered image service";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 默认图片质量
    pub struct DefaultImageQuality;
    impl EnvVar<u8> for DefaultImageQuality {
        const NAME: &'static str = "RETCON_DEFAULT_IMAGE_QUALITY";
        const DEFAULT: Option<u8> = Some(90);
        const DESCRIPTION: &'static str = "Quality (1-100) used when a transform does not set one";

        fn parse(value: &str) -> EnvResult<u8> {
            let quality: u8 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a number between 1 and 100".to_string(),
            })?;
            if !(1..=100).contains(&quality) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Value {} is outside 1-100", quality),
                });
            }
            Ok(quality)
        }
    }
}

/// 输出相关环境变量
pub mod output {
    use super::*;

    /// 是否在输出中解析引用令牌
    pub struct ParseRefs;
    impl EnvVar<bool> for ParseRefs {
        const NAME: &'static str = "RETCON_PARSE_REFS";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Resolve reference tokens in the filtered output";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
pub fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_non_empty(value: &str, var_name: &str) -> EnvResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub config_path: Option<String>,

    pub base_transform_path: Option<String>,
    pub base_transform_url: Option<String>,
    pub site_url: Option<String>,
    pub use_image_service: bool,
    pub default_image_quality: u8,

    pub parse_refs: bool,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: general::LogLevel::get()?,
            config_path: general::ConfigPath::get().ok(),

            base_transform_path: images::BaseTransformPath::get().ok(),
            base_transform_url: images::BaseTransformUrl::get().ok(),
            site_url: images::SiteUrl::get().ok(),
            use_image_service: images::UseImageService::get()?,
            default_image_quality: images::DefaultImageQuality::get()?,

            parse_refs: output::ParseRefs::get()?,
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&format!("- `{}`: {} (default: warn)\n",
        general::LogLevel::NAME, general::LogLevel::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {}\n",
        general::ConfigPath::NAME, general::ConfigPath::DESCRIPTION));

    docs.push_str("\n## Images\n\n");
    docs.push_str(&format!("- `{}`: {}\n",
        images::BaseTransformPath::NAME, images::BaseTransformPath::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {}\n",
        images::BaseTransformUrl::NAME, images::BaseTransformUrl::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {}\n",
        images::SiteUrl::NAME, images::SiteUrl::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        images::UseImageService::NAME, images::UseImageService::DESCRIPTION, images::UseImageService::DEFAULT));
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        images::DefaultImageQuality::NAME, images::DefaultImageQuality::DESCRIPTION, images::DefaultImageQuality::DEFAULT));

    docs.push_str("\n## Output\n\n");
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        output::ParseRefs::NAME, output::ParseRefs::DESCRIPTION, output::ParseRefs::DEFAULT));

    docs
}
