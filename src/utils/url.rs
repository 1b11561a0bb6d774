//! URL 与路径工具
//!
//! 图片过滤器需要判断图片是否为本站资源、把 URL 路径映射到本地文件，
//! 以及清理拼接路径时产生的重复斜杠。

use std::path::Path;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
pub use url::Url;

/// 拆分后的图片地址
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageUrl {
    /// 主机名；相对地址为 `None`
    pub host: Option<String>,
    /// 已解码的路径，不含查询串和片段
    pub path: String,
}

/// 将连续的斜杠合并为一个，`scheme://` 中的双斜杠保留
pub fn fix_slashes(value: &str) -> String {
    static SLASHES_RE: OnceLock<Regex> = OnceLock::new();
    SLASHES_RE
        .get_or_init(|| Regex::new(r"(^|[^:])//+").expect("static regex"))
        .replace_all(value, "${1}/")
        .into_owned()
}

pub fn is_data_url(value: &str) -> bool {
    value.trim_start().get(..5).map_or(false, |scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// 解析图片地址，接受绝对 URL、协议相对地址（`//cdn/...`）和站内路径
pub fn parse_image_url(value: &str) -> ImageUrl {
    let value = value.trim();

    let absolute = if value.starts_with("//") {
        Url::parse(&format!("http:{}", value)).ok()
    } else {
        Url::parse(value).ok()
    };

    if let Some(url) = absolute.filter(|url| url.has_host()) {
        return ImageUrl {
            host: url.host_str().map(str::to_string),
            path: decode_path(url.path()),
        };
    }

    let path = value
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    ImageUrl {
        host: None,
        path: decode_path(path),
    }
}

fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// 站点 URL 的主机名
pub fn site_host(site_url: Option<&str>) -> Option<String> {
    site_url
        .and_then(|site| Url::parse(site).ok())
        .and_then(|url| url.host_str().map(str::to_string))
}

/// 没有主机名或主机名与站点一致的图片视为本站图片
pub fn is_local_image(image: &ImageUrl, site_url: Option<&str>) -> bool {
    match &image.host {
        None => true,
        Some(host) => site_host(site_url).map_or(false, |site| site.eq_ignore_ascii_case(host)),
    }
}

/// 路径最后一段去掉扩展名，如 `/a/b/photo.large.jpg` -> `photo.large`
pub fn file_stem(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

/// 小写的扩展名
pub fn file_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
}

/// 路径中的目录部分（以 `/` 开头，不以 `/` 结尾）
pub fn dir_name(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => String::from("/"),
        Some(index) => path[..index].to_string(),
    }
}

/// 规范化站内路径：去掉空段和 `.`，`..` 回退一级，结果以 `/` 开头
///
/// `..` 越过根目录时返回 `None`，这样映射到本地文件时不会离开根目录。
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            segment => segments.push(segment),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// 将图片路径映射到本地根目录之下；离开根目录的路径返回 `None`
pub fn local_image_path(base_path: &str, image_path: &str) -> Option<String> {
    normalize_path(image_path).map(|path| fix_slashes(&format!("{}/{}", base_path, path)))
}
