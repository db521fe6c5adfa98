//! Overlay and underlay layer specifications
//!
//! A layer option is either a pre-built string, a `fetch:<url>` shorthand or
//! an options hash. Hashes resolve to one of the [`LayerSpec`] variants by
//! shape and then render their own `:`-joined layer string.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::util::{base64_encode_url, camel_case, is_empty, is_number_like, smart_escape, smart_escape_with, truthy, value_token, Options};

/// Errors raised while rendering a layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LayerError {
    /// A plain resource layer without a public id
    #[error("Must supply publicId")]
    MissingPublicId,
    /// A fetch layer without a URL
    #[error("Must supply url for a fetch layer")]
    MissingUrl,
    /// Text given with both or neither of style parameters and a public id
    #[error("Must supply either style parameters or a public_id when providing text parameter in a text overlay/underlay, but not both!")]
    TextStyleConflict,
    /// Style keywords given without a font family
    #[error("Must supply fontFamily. {0}")]
    MissingFontFamily(String),
    /// Style keywords given without a font size
    #[error("Must supply fontSize.")]
    MissingFontSize,
}

fn text_token(options: &Options, key: &str) -> Option<String> {
    options.get(key).filter(|v| !v.is_null()).map(value_token)
}

/// A layer referencing an uploaded asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub resource_type: Option<String>,
    pub delivery_type: Option<String>,
    pub public_id: Option<String>,
    pub format: Option<String>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `resourceType`, `type`, `publicId` and `format` from camelCase options.
    pub fn from_options(options: &Options) -> Self {
        Self {
            resource_type: text_token(options, "resourceType"),
            delivery_type: text_token(options, "type"),
            public_id: text_token(options, "publicId"),
            format: text_token(options, "format"),
        }
    }

    pub fn resource_type(mut self, value: &str) -> Self {
        self.resource_type = Some(value.to_string());
        self
    }

    pub fn delivery_type(mut self, value: &str) -> Self {
        self.delivery_type = Some(value.to_string());
        self
    }

    pub fn public_id(mut self, value: &str) -> Self {
        self.public_id = Some(value.to_string());
        self
    }

    pub fn format(mut self, value: &str) -> Self {
        self.format = Some(value.to_string());
        self
    }

    /// The public id with `/` rewritten to `:`.
    pub fn layer_public_id(&self) -> Option<String> {
        self.public_id.as_ref().map(|id| id.replace('/', ":"))
    }

    /// [`Layer::layer_public_id`] with the format appended.
    pub fn full_public_id(&self) -> Option<String> {
        let id = self.layer_public_id()?;
        Some(match &self.format {
            Some(format) => format!("{}.{}", id, format),
            None => id,
        })
    }

    pub fn serialize(&self) -> Result<String, LayerError> {
        let full_id = self.full_public_id().ok_or(LayerError::MissingPublicId)?;
        let mut components = Vec::new();
        if self.resource_type.as_deref() != Some("image") {
            components.extend(self.resource_type.clone());
        }
        if self.delivery_type.as_deref() != Some("upload") {
            components.extend(self.delivery_type.clone());
        }
        components.push(full_id);
        Ok(components.into_iter().filter(|c| !c.is_empty()).collect::<Vec<_>>().join(":"))
    }
}

/// A layer fetched from a remote URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchLayer {
    pub url: Option<String>,
}

impl FetchLayer {
    pub fn new(url: &str) -> Self {
        Self { url: Some(url.to_string()) }
    }

    pub fn serialize(&self) -> Result<String, LayerError> {
        let url = self.url.as_deref().ok_or(LayerError::MissingUrl)?;
        Ok(format!("fetch:{}", base64_encode_url(url)))
    }
}

/// A text (or subtitles) layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    pub public_id: Option<String>,
    pub format: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<Value>,
    pub font_weight: Option<String>,
    pub font_style: Option<String>,
    pub text_decoration: Option<String>,
    pub text_align: Option<String>,
    pub stroke: Option<String>,
    pub letter_spacing: Option<Value>,
    pub line_spacing: Option<Value>,
    pub font_antialiasing: Option<String>,
    pub font_hinting: Option<String>,
    pub text: Option<String>,
    pub text_style: Option<String>,
}

fn interpolation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\([a-zA-Z]\w*\)").expect("interpolation pattern is valid"))
}

/// Escape layer text. `,` and `/` are escaped twice; `$(var)` references are kept.
pub fn escape_layer_text(text: &str) -> String {
    let source = smart_escape_with(text, |c| c == ',' || c == '/');
    let mut escaped = String::with_capacity(source.len());
    let mut start = 0;
    for m in interpolation_re().find_iter(&source) {
        escaped.push_str(&smart_escape(&source[start..m.start()]));
        escaped.push_str(m.as_str());
        start = m.end();
    }
    escaped.push_str(&smart_escape(&source[start..]));
    escaped
}

fn keyword(value: &Option<String>, default: &str) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty() && v.as_str() != default).cloned()
}

fn spacing(prefix: &str, value: &Option<Value>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !is_empty(v) || is_number_like(v))
        .map(|v| format!("{}_{}", prefix, value_token(v)))
}

impl TextLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read text-layer fields from camelCase options.
    pub fn from_options(options: &Options) -> Self {
        let raw = |key: &str| options.get(key).filter(|v| !v.is_null()).cloned();
        Self {
            public_id: text_token(options, "publicId"),
            format: text_token(options, "format"),
            font_family: text_token(options, "fontFamily"),
            font_size: raw("fontSize"),
            font_weight: text_token(options, "fontWeight"),
            font_style: text_token(options, "fontStyle"),
            text_decoration: text_token(options, "textDecoration"),
            text_align: text_token(options, "textAlign"),
            stroke: text_token(options, "stroke"),
            letter_spacing: raw("letterSpacing"),
            line_spacing: raw("lineSpacing"),
            font_antialiasing: text_token(options, "fontAntialiasing"),
            font_hinting: text_token(options, "fontHinting"),
            text: text_token(options, "text"),
            text_style: text_token(options, "textStyle"),
        }
    }

    pub fn text(mut self, value: &str) -> Self {
        self.text = Some(value.to_string());
        self
    }

    pub fn font_family(mut self, value: &str) -> Self {
        self.font_family = Some(value.to_string());
        self
    }

    pub fn font_size(mut self, value: impl Into<Value>) -> Self {
        self.font_size = Some(value.into());
        self
    }

    pub fn font_weight(mut self, value: &str) -> Self {
        self.font_weight = Some(value.to_string());
        self
    }

    pub fn text_align(mut self, value: &str) -> Self {
        self.text_align = Some(value.to_string());
        self
    }

    pub fn public_id(mut self, value: &str) -> Self {
        self.public_id = Some(value.to_string());
        self
    }

    pub fn text_style(mut self, value: &str) -> Self {
        self.text_style = Some(value.to_string());
        self
    }

    /// The `family_size[_keywords…]` style identifier, or an explicit `text_style`.
    pub fn style_identifier(&self) -> Result<String, LayerError> {
        if let Some(style) = self.text_style.as_ref().filter(|s| !s.is_empty()) {
            return Ok(style.clone());
        }

        let keywords: Vec<String> = [
            keyword(&self.font_weight, "normal"),
            keyword(&self.font_style, "normal"),
            keyword(&self.text_decoration, "none"),
            keyword(&self.text_align, ""),
            keyword(&self.stroke, "none"),
            spacing("letter_spacing", &self.letter_spacing),
            spacing("line_spacing", &self.line_spacing),
            keyword(&self.font_antialiasing, "").map(|v| format!("antialias_{}", v)),
            keyword(&self.font_hinting, "").map(|v| format!("hinting_{}", v)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let family = self.font_family.clone().filter(|f| !f.is_empty());
        let size = self.font_size.as_ref().filter(|s| !is_empty(s) || is_number_like(s));
        if !keywords.is_empty() {
            if family.is_none() {
                return Err(LayerError::MissingFontFamily(keywords.join(",")));
            }
            if size.is_none() {
                return Err(LayerError::MissingFontSize);
            }
        }

        let mut components: Vec<String> = Vec::new();
        components.extend(family);
        components.extend(size.filter(|s| truthy(s)).map(value_token));
        components.extend(keywords);
        Ok(components.join("_"))
    }

    fn serialize_as(&self, resource_type: &str) -> Result<String, LayerError> {
        let style = self.style_identifier()?;
        let public_id = Layer { public_id: self.public_id.clone(), format: self.format.clone(), ..Layer::default() }
            .full_public_id();

        let mut text = None;
        if let Some(raw) = &self.text {
            let has_public_id = public_id.as_ref().map_or(false, |id| !id.is_empty());
            let has_style = !style.is_empty();
            if has_public_id == has_style {
                return Err(LayerError::TextStyleConflict);
            }
            text = Some(escape_layer_text(raw));
        }

        let components = [Some(resource_type.to_string()), Some(style), public_id, text];
        Ok(components.into_iter().flatten().filter(|c| !c.is_empty()).collect::<Vec<_>>().join(":"))
    }

    pub fn serialize(&self) -> Result<String, LayerError> {
        self.serialize_as("text")
    }
}

/// A resolved layer specification.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    Plain(Layer),
    Fetch(FetchLayer),
    Text(TextLayer),
    Subtitles(TextLayer),
}

impl LayerSpec {
    /// Pick the layer kind from the shape of an options hash.
    ///
    /// Keys may be given in snake_case or camelCase.
    pub fn from_options(options: &Options) -> Self {
        let options: Options = options.iter().map(|(k, v)| (camel_case(k), v.clone())).collect();
        let resource_type = options.get("resourceType").and_then(Value::as_str);
        let has = |key: &str| options.get(key).map_or(false, |v| !v.is_null());

        if resource_type == Some("text") || has("text") {
            LayerSpec::Text(TextLayer::from_options(&options))
        } else if resource_type == Some("subtitles") {
            LayerSpec::Subtitles(TextLayer::from_options(&options))
        } else if resource_type == Some("fetch") || has("url") {
            LayerSpec::Fetch(FetchLayer { url: text_token(&options, "url") })
        } else {
            LayerSpec::Plain(Layer::from_options(&options))
        }
    }

    pub fn serialize(&self) -> Result<String, LayerError> {
        match self {
            LayerSpec::Plain(layer) => layer.serialize(),
            LayerSpec::Fetch(layer) => layer.serialize(),
            LayerSpec::Text(layer) => layer.serialize_as("text"),
            LayerSpec::Subtitles(layer) => layer.serialize_as("subtitles"),
        }
    }
}

/// Resolve a layer option value to its layer string.
///
/// Hashes are dispatched through [`LayerSpec`], `fetch:<url>` strings become
/// fetch layers, and any other value is returned as-is.
pub fn resolve(value: &Value) -> Result<Value, LayerError> {
    match value {
        Value::Object(options) => LayerSpec::from_options(options).serialize().map(Value::String),
        Value::String(s) if s.len() > 6 && s.starts_with("fetch:") => {
            FetchLayer::new(&s[6..]).serialize().map(Value::String)
        }
        other => Ok(other.clone()),
    }
}
