use std::fmt;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::config::RetconSettings;
use crate::filters::{FilterOp, FilterRegistry};
use crate::images::{
    get_image_dimensions, ImageTransformer, LocalImageTransformer, TransformDescriptor,
    TransformedImage,
};
use crate::parsers::html::Fragment;
use crate::references::{NoopReferenceResolver, ReferenceResolver, StaticReferenceResolver};

use markup5ever_rcdom::Handle;

/// Errors surfaced by a filter pipeline
///
/// Malformed markup and images that cannot be transformed are never errors;
/// they are logged and the affected node is left as it was.
#[derive(Error, Debug)]
pub enum RetconError {
    #[error("No filter operation specified")]
    MissingOperation,

    #[error("Retcon filter \"{0}\" does not exist")]
    UnknownOperation(String),

    #[error("Invalid argument for filter \"{filter}\": {message}")]
    InvalidArgument { filter: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad error classes, mirroring how callers are expected to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The pipeline itself is wrong: no ops, unknown op, bad arguments
    InvalidPipeline,
    /// A required setting is missing or invalid
    Configuration,
    Internal,
}

impl RetconError {
    pub fn invalid_argument(filter: &str, message: impl Into<String>) -> Self {
        RetconError::InvalidArgument {
            filter: filter.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RetconError::MissingOperation
            | RetconError::UnknownOperation(_)
            | RetconError::InvalidArgument { .. } => ErrorCategory::InvalidPipeline,
            RetconError::Configuration(_) => ErrorCategory::Configuration,
            RetconError::Io(_) => ErrorCategory::Internal,
        }
    }
}

pub type RetconResult<T> = Result<T, RetconError>;

/// Pipeline output: HTML that is already safe to embed and must not be escaped again
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn new(html: impl Into<String>) -> Self {
        Markup(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Markup> for String {
    fn from(markup: Markup) -> Self {
        markup.0
    }
}

impl AsRef<str> for Markup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns true when the input has nothing but whitespace in it
pub fn is_blank_html(html: &str) -> bool {
    html.chars().all(char::is_whitespace)
}

/// The filter service
///
/// Owns the settings, the filter registry and the collaborators the image
/// and reference filters delegate to. One `Retcon` can serve any number of
/// calls; every call parses its own [`Fragment`].
pub struct Retcon {
    settings: RetconSettings,
    registry: FilterRegistry,
    image_service: Option<Box<dyn ImageTransformer>>,
    local_transformer: LocalImageTransformer,
    resolver: Box<dyn ReferenceResolver>,
    transform_cache: DashMap<String, Option<TransformDescriptor>>,
}

impl Retcon {
    pub fn new(settings: RetconSettings) -> Retcon {
        let resolver: Box<dyn ReferenceResolver> = if settings.references.is_empty() {
            Box::new(NoopReferenceResolver)
        } else {
            Box::new(StaticReferenceResolver::new(settings.references.clone()))
        };

        Retcon {
            local_transformer: LocalImageTransformer::from_settings(&settings),
            registry: FilterRegistry::default(),
            image_service: None,
            resolver,
            transform_cache: DashMap::new(),
            settings,
        }
    }

    /// Registers an external image service; used when `use_image_service` is on
    pub fn with_image_service<T: ImageTransformer + 'static>(mut self, transformer: T) -> Self {
        self.image_service = Some(Box::new(transformer));
        self.transform_cache.clear();
        self
    }

    pub fn with_resolver<R: ReferenceResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn settings(&self) -> &RetconSettings {
        &self.settings
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &dyn ReferenceResolver {
        self.resolver.as_ref()
    }

    /// Runs an ordered list of filter operations over one parsed fragment
    pub fn run(&self, html: &str, ops: &[FilterOp]) -> RetconResult<Markup> {
        if is_blank_html(html) {
            return Ok(Markup::new(html));
        }

        if ops.is_empty() {
            return Err(RetconError::MissingOperation);
        }

        // Resolve every name before touching the tree
        let filters = ops
            .iter()
            .map(|op| {
                self.registry
                    .get(&op.name)
                    .ok_or_else(|| RetconError::UnknownOperation(op.name.clone()))
            })
            .collect::<RetconResult<Vec<_>>>()?;

        let fragment = Fragment::parse(html);
        for (filter, op) in filters.into_iter().zip(ops.iter()) {
            tracing::debug!("applying filter {} with {} argument(s)", filter.name(), op.args.len());
            filter.apply(self, &fragment, &op.args)?;
        }

        self.finish(&fragment)
    }

    /// Runs a single named filter
    pub fn apply(&self, html: &str, name: &str, args: Vec<Value>) -> RetconResult<Markup> {
        self.run(html, &[FilterOp::new(name, args)])
    }

    /// Runs operations given as JSON: either `["name", arg, ...]` or a list of such arrays
    pub fn run_value(&self, html: &str, ops: &Value) -> RetconResult<Markup> {
        if is_blank_html(html) {
            return Ok(Markup::new(html));
        }
        let ops = FilterOp::parse_ops(ops)?;
        self.run(html, &ops)
    }

    /// Serializes the fragment and resolves reference tokens in the result
    fn finish(&self, fragment: &Fragment) -> RetconResult<Markup> {
        let html = fragment.serialize()?;
        if self.settings.parse_refs {
            Ok(Markup::new(self.resolver.parse_refs(&html)))
        } else {
            Ok(Markup::new(html))
        }
    }

    /// Resolves reference tokens in a single value (an `src`, an `href`)
    pub fn parse_ref(&self, value: &str) -> String {
        self.resolver.parse_refs(value)
    }

    fn delegates_to_image_service(&self) -> bool {
        self.settings.use_image_service && self.image_service.is_some()
    }

    /// Turns a transform argument into a descriptor
    ///
    /// Strings are looked up as named transforms (memoized when
    /// `cache_named_transforms` is on), objects are taken inline.
    pub fn resolve_transform(&self, transform: &Value) -> Option<TransformDescriptor> {
        match transform {
            Value::String(name) => {
                if self.settings.cache_named_transforms {
                    if let Some(cached) = self.transform_cache.get(name) {
                        return cached.value().clone();
                    }
                }

                let resolved = match &self.image_service {
                    Some(service) if self.settings.use_image_service => service
                        .resolve_named_transform(name)
                        .or_else(|| self.settings.transforms.get(name).cloned()),
                    _ => self.settings.transforms.get(name).cloned(),
                };

                if resolved.is_none() {
                    tracing::debug!("named transform \"{}\" not found", name);
                }

                if self.settings.cache_named_transforms {
                    self.transform_cache.insert(name.clone(), resolved.clone());
                }
                resolved
            }
            Value::Object(_) => match serde_json::from_value::<TransformDescriptor>(transform.clone()) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::debug!("invalid inline transform {}: {}", transform, e);
                    None
                }
            },
            _ => None,
        }
    }

    /// Drops every memoized named transform
    pub fn clear_transform_cache(&self) {
        self.transform_cache.clear();
    }

    /// Transforms one image source; `Ok(None)` means the node should be left alone
    pub fn transform_image(
        &self,
        src: &str,
        transform: &TransformDescriptor,
        defaults: Option<&TransformDescriptor>,
        overrides: Option<&Value>,
    ) -> RetconResult<Option<TransformedImage>> {
        let image_url = self.parse_ref(src);

        match &self.image_service {
            Some(service) if self.delegates_to_image_service() => {
                service.transform_image(&image_url, transform, defaults, overrides)
            }
            _ => self
                .local_transformer
                .transform_image(&image_url, transform, defaults, overrides),
        }
    }

    /// Width and height for an image node, from its attributes or the local file
    pub fn image_dimensions(&self, node: &Handle) -> Option<(u32, u32)> {
        get_image_dimensions(node, &self.settings, self.resolver.as_ref())
    }
}

impl Default for Retcon {
    fn default() -> Self {
        Retcon::new(RetconSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_input_short_circuits() {
        let retcon = Retcon::default();
        assert_eq!(retcon.run("", &[]).unwrap().as_str(), "");
        assert_eq!(retcon.run("  \n ", &[]).unwrap().as_str(), "  \n ");
    }

    #[test]
    fn missing_operation_is_an_error() {
        let retcon = Retcon::default();
        let error = retcon.run("<p>x</p>", &[]).unwrap_err();
        assert!(matches!(error, RetconError::MissingOperation));
        assert_eq!(error.category(), ErrorCategory::InvalidPipeline);
    }

    #[test]
    fn unknown_operation_names_the_filter() {
        let retcon = Retcon::default();
        let error = retcon
            .run("<p>x</p>", &[FilterOp::new("explode", vec![])])
            .unwrap_err();
        assert_eq!(error.to_string(), "Retcon filter \"explode\" does not exist");
    }

    #[test]
    fn named_transforms_are_memoized() {
        let mut settings = RetconSettings::default();
        settings.transforms.insert(
            "thumb".to_string(),
            TransformDescriptor {
                width: Some(100),
                ..Default::default()
            },
        );
        let retcon = Retcon::new(settings);

        assert_eq!(retcon.resolve_transform(&json!("thumb")).unwrap().width, Some(100));
        assert!(retcon.transform_cache.contains_key("thumb"));
        assert!(retcon.resolve_transform(&json!("missing")).is_none());

        retcon.clear_transform_cache();
        assert!(retcon.transform_cache.is_empty());
    }

    #[test]
    fn inline_transforms_are_deserialized() {
        let retcon = Retcon::default();
        let descriptor = retcon
            .resolve_transform(&json!({"width": 300, "height": 200, "mode": "fit"}))
            .unwrap();
        assert_eq!(descriptor.width, Some(300));
        assert_eq!(descriptor.mode.as_deref(), Some("fit"));
        assert!(retcon.resolve_transform(&json!(42)).is_none());
    }
}
