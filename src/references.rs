//! 引用令牌解析
//!
//! 富文本中的内部链接以 `{type:id(@site)?(:field)?(||fallback)?}` 的形式保存，
//! 例如 `{asset:12:url}`、`{entry:about@en:title||About}`。
//! 过滤器在读取 `src` 之前以及序列化之后会调用 [`ReferenceResolver::parse_refs`]。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 引用令牌的正则表达式
fn ref_token_regex() -> &'static Regex {
    static REF_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    REF_TOKEN_RE.get_or_init(|| {
        Regex::new(
            r"\{([\w\\]+):([^@:}|\s]+)(?:@([^:}|\s]+))?(?::([^}|\s]+))?(?:\|\|([^}]*))?\}",
        )
        .expect("static regex")
    })
}

/// 一个解析后的引用令牌
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefToken {
    /// 元素类型，如 `asset`、`entry`
    pub element_type: String,
    /// ID 或 slug
    pub reference: String,
    pub site: Option<String>,
    /// 要输出的字段，缺省为 `url`
    pub field: Option<String>,
    /// 无法解析时的替代文本
    pub fallback: Option<String>,
}

impl RefToken {
    fn from_captures(captures: &Captures) -> RefToken {
        let group = |index: usize| captures.get(index).map(|m| m.as_str().to_string());
        RefToken {
            element_type: group(1).unwrap_or_default(),
            reference: group(2).unwrap_or_default(),
            site: group(3),
            field: group(4),
            fallback: group(5),
        }
    }

    /// 仅当整个值（去掉首尾空白）是一个令牌时解析成功
    pub fn parse(value: &str) -> Option<RefToken> {
        let value = value.trim();
        let captures = ref_token_regex().captures(value)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 || whole.end() != value.len() {
            return None;
        }
        Some(RefToken::from_captures(&captures))
    }

    /// 要读取的字段名
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or("url")
    }
}

/// 引用目标
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencedEntity {
    pub element_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

/// ID 可以写成数字或字符串
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(number) => number.to_string(),
        Id::Text(text) => text,
    })
}

impl ReferencedEntity {
    /// 按名称读取字段；`id`、`slug`、`title`、`url` 之外的名称从 `fields` 中查找
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            "id" => Some(self.id.clone()),
            "slug" => self.slug.clone(),
            "title" => self.title.clone(),
            "url" => self.url.clone(),
            other => match self.fields.get(other)? {
                Value::String(text) => Some(text.clone()),
                Value::Null => None,
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                complex => Some(complex.to_string()),
            },
        };
        value.filter(|value| !value.is_empty())
    }

    fn matches(&self, token: &RefToken) -> bool {
        self.element_type == token.element_type
            && (self.id == token.reference || self.slug.as_deref() == Some(token.reference.as_str()))
    }
}

/// 引用解析器
///
/// 由宿主系统提供；内置的实现只有 [`NoopReferenceResolver`] 和
/// [`StaticReferenceResolver`]。
pub trait ReferenceResolver: Send + Sync {
    /// 查找令牌指向的元素
    fn resolve_ref_to_entity(&self, token: &RefToken) -> Option<ReferencedEntity>;

    /// 令牌对应的文本，找不到元素或字段时返回 `None`
    fn resolve_ref(&self, token: &RefToken) -> Option<String> {
        self.resolve_ref_to_entity(token)?.field(token.field_name())
    }

    /// 替换文本中的全部令牌
    ///
    /// 无法解析的令牌使用替代文本，没有替代文本时保持原样。
    fn parse_refs(&self, text: &str) -> String {
        if !text.contains('{') {
            return text.to_string();
        }

        ref_token_regex()
            .replace_all(text, |captures: &Captures| {
                let token = RefToken::from_captures(captures);
                match self.resolve_ref(&token) {
                    Some(resolved) => resolved,
                    None => {
                        tracing::debug!("unresolved reference {}", &captures[0]);
                        token.fallback.unwrap_or_else(|| captures[0].to_string())
                    }
                }
            })
            .into_owned()
    }
}

/// 不解析任何引用
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReferenceResolver;

impl ReferenceResolver for NoopReferenceResolver {
    fn resolve_ref_to_entity(&self, _token: &RefToken) -> Option<ReferencedEntity> {
        None
    }

    fn parse_refs(&self, text: &str) -> String {
        text.to_string()
    }
}

/// 基于固定列表的解析器，元素来自配置文件
#[derive(Clone, Debug, Default)]
pub struct StaticReferenceResolver {
    entities: Vec<ReferencedEntity>,
}

impl StaticReferenceResolver {
    pub fn new(entities: Vec<ReferencedEntity>) -> Self {
        StaticReferenceResolver { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl ReferenceResolver for StaticReferenceResolver {
    fn resolve_ref_to_entity(&self, token: &RefToken) -> Option<ReferencedEntity> {
        self.entities.iter().find(|entity| entity.matches(token)).cloned()
    }
}
