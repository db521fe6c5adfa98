//! Transformation parameters
//!
//! A [`Param`] pairs a logical name and an optional wire code with the
//! original option value. How the value is processed and how it serializes
//! are chosen by [`Process`] and [`ParamSpec`].

use serde_json::Value;

use crate::expression::normalize_value;
use crate::layer::{self, LayerError};
use crate::normalize::{norm_border, norm_color, norm_dpr, norm_fps, norm_range_value, norm_video_codec};
use crate::transformation::Transformation;
use crate::util::{is_empty, value_token};

/// Value processing applied when a parameter is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Identity,
    Expression,
    Color,
    Border,
    Dpr,
    Fps,
    VideoCodec,
    Range,
    /// Expression-normalized, but only meaningful next to a crop mode or layer
    Dimension,
    Condition,
}

impl Process {
    pub fn apply(self, value: &Value) -> Value {
        match self {
            Process::Identity => value.clone(),
            Process::Expression | Process::Dimension | Process::Condition => normalize_value(value),
            Process::Color => norm_color(value),
            Process::Border => norm_border(value),
            Process::Dpr => norm_dpr(value),
            Process::Fps => norm_fps(value),
            Process::VideoCodec => norm_video_codec(value),
            Process::Range => norm_range_value(value),
        }
    }
}

/// Parameter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpec {
    /// A single value
    Scalar,
    /// One or more values joined by `sep`
    Array { sep: &'static str },
    /// Nested transformations, joined by `sep` when all are named references
    Nested { sep: &'static str },
    /// An overlay or underlay
    Layer,
    /// Passed through verbatim with no code
    Raw,
}

/// The serialized form of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Serialized {
    /// A `code_value` token (empty when there is nothing to emit)
    Token(String),
    /// Complete chain links that precede the owning link
    Links(Vec<String>),
}

impl Serialized {
    pub fn is_empty(&self) -> bool {
        match self {
            Serialized::Token(token) => token.is_empty(),
            Serialized::Links(links) => links.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    short_name: Option<String>,
    spec: ParamSpec,
    process: Process,
    orig_value: Value,
}

impl Param {
    pub fn new(name: &str, short_name: Option<&str>, spec: ParamSpec, process: Process) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.map(str::to_string),
            spec,
            process,
            orig_value: Value::Null,
        }
    }

    pub fn scalar(name: &str, short_name: Option<&str>, process: Process) -> Self {
        Self::new(name, short_name, ParamSpec::Scalar, process)
    }

    /// Store the original value. Array and nested parameters always hold an array.
    pub fn set(mut self, value: Value) -> Self {
        self.orig_value = match (self.spec, value) {
            (ParamSpec::Array { .. }, Value::Null) => Value::Null,
            (ParamSpec::Array { .. } | ParamSpec::Nested { .. }, Value::Array(items)) => Value::Array(items),
            (ParamSpec::Array { .. } | ParamSpec::Nested { .. }, other) => Value::Array(vec![other]),
            (_, other) => other,
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn spec(&self) -> ParamSpec {
        self.spec
    }

    pub fn process(&self) -> Process {
        self.process
    }

    /// The value as it was set, before processing.
    pub fn orig_value(&self) -> &Value {
        &self.orig_value
    }

    /// The processed value. Layers resolve to their layer string.
    pub fn value(&self) -> Result<Value, LayerError> {
        match self.spec {
            ParamSpec::Layer => layer::resolve(&self.orig_value),
            ParamSpec::Array { .. } | ParamSpec::Nested { .. } => Ok(match &self.orig_value {
                Value::Array(items) => Value::Array(items.iter().map(|v| self.process.apply(v)).collect()),
                other => self.process.apply(other),
            }),
            ParamSpec::Scalar | ParamSpec::Raw => Ok(self.process.apply(&self.orig_value)),
        }
    }

    pub fn serialize(&self) -> Result<Serialized, LayerError> {
        let value = self.value()?;
        self.serialize_value(&value)
    }

    /// Serialize an already-processed value.
    pub fn serialize_value(&self, value: &Value) -> Result<Serialized, LayerError> {
        match self.spec {
            ParamSpec::Scalar | ParamSpec::Layer => Ok(Serialized::Token(self.serialize_scalar(value))),
            ParamSpec::Array { sep } => Ok(Serialized::Token(self.serialize_array(value, sep))),
            ParamSpec::Raw => Ok(Serialized::Token(value_token(value))),
            ParamSpec::Nested { sep } => self.serialize_nested(value, sep),
        }
    }

    fn serialize_scalar(&self, value: &Value) -> String {
        let valid = match value {
            Value::Array(_) | Value::Object(_) | Value::String(_) => !is_empty(value),
            other => !other.is_null(),
        };
        match &self.short_name {
            Some(short) if valid => format!("{}_{}", short, value_token(value)),
            _ => String::new(),
        }
    }

    fn serialize_array(&self, value: &Value, sep: &str) -> String {
        let Some(short) = &self.short_name else {
            return String::new();
        };
        if is_empty(value) {
            return String::new();
        }
        match value {
            Value::Array(items) => {
                format!("{}_{}", short, items.iter().map(value_token).collect::<Vec<_>>().join(sep))
            }
            other => format!("{}_{}", short, value_token(other)),
        }
    }

    fn serialize_nested(&self, value: &Value, sep: &str) -> Result<Serialized, LayerError> {
        let short = self.short_name.as_deref().unwrap_or("t");
        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => return Ok(Serialized::Token(String::new())),
        };

        if items.iter().all(Value::is_string) {
            let joined = items.iter().map(value_token).collect::<Vec<_>>().join(sep);
            return Ok(Serialized::Token(if joined.is_empty() {
                String::new()
            } else {
                format!("{}_{}", short, joined)
            }));
        }

        let mut links = Vec::new();
        for item in items {
            match item {
                Value::String(name) if !name.is_empty() => links.push(format!("{}_{}", short, name)),
                Value::Object(options) if !options.is_empty() => {
                    links.push(Transformation::from_options(item).serialize()?)
                }
                _ => {}
            }
        }
        links.retain(|link| !link.is_empty());
        Ok(Serialized::Links(links))
    }
}
