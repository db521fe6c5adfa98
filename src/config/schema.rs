//! Configuration schema for `cloudinary.toml`
//!
//! Delivery settings are an open key/value bag, like the options hashes they
//! are merged with. Recognized keys are listed in [`CONFIG_PARAMS`] and have
//! typed accessors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::{truthy, value_token, Options};

/// Recognized configuration keys.
pub const CONFIG_PARAMS: &[&str] = &[
    "api_key",
    "api_secret",
    "callback",
    "cdn_subdomain",
    "cloud_name",
    "cname",
    "private_cdn",
    "protocol",
    "resource_type",
    "responsive",
    "responsive_class",
    "responsive_use_breakpoints",
    "responsive_width",
    "round_dpr",
    "secure",
    "secure_cdn_subdomain",
    "secure_distribution",
    "shorten",
    "type",
    "upload_preset",
    "url_suffix",
    "use_root_path",
    "version",
];

/// Hardcoded defaults, the lowest configuration layer.
pub fn default_params() -> Options {
    let mut defaults = Options::new();
    defaults.insert("responsive_class".to_string(), Value::from("cld-responsive"));
    defaults.insert("responsive_use_breakpoints".to_string(), Value::Bool(true));
    defaults.insert("round_dpr".to_string(), Value::Bool(true));
    defaults.insert("secure".to_string(), Value::Bool(false));
    defaults
}

/// Resolved delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: Options,
}

impl Configuration {
    /// An empty configuration (no defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration holding only the hardcoded defaults.
    pub fn with_defaults() -> Self {
        Self { values: default_params() }
    }

    pub fn from_options(options: Options) -> Self {
        Self { values: options }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String form of a setting; null and missing read as `None`.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_null()).map(value_token)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Overwrite settings with every key of `options`.
    pub fn merge(&mut self, options: &Options) -> &mut Self {
        for (key, value) in options {
            self.values.insert(key.clone(), value.clone());
        }
        self
    }

    /// Truthiness of a setting. `"false"` and `"0"` strings, as read from
    /// meta tags and query strings, count as false.
    pub fn flag(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(Value::String(s)) => !matches!(s.as_str(), "" | "false" | "0"),
            Some(value) => truthy(value),
            None => false,
        }
    }

    pub fn cloud_name(&self) -> Option<&str> {
        self.values.get("cloud_name").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn options(&self) -> &Options {
        &self.values
    }

    /// A copy of the settings, for merging under call-time options.
    pub fn to_options(&self) -> Options {
        self.values.clone()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        match self.values.get("cloud_name") {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) if !name.is_empty() => {}
            Some(_) => errors.push(ConfigValidationError {
                field: "cloud_name".to_string(),
                message: "must be a non-empty string".to_string(),
            }),
        }

        if let Some(suffix) = self.get_str("url_suffix") {
            if suffix.contains('.') || suffix.contains('/') {
                errors.push(ConfigValidationError {
                    field: "url_suffix".to_string(),
                    message: "must not contain '.' or '/'".to_string(),
                });
            }
        }

        if let Some(algorithm) = self.get_str("signature_algorithm") {
            if !matches!(algorithm.as_str(), "sha1" | "sha256") {
                errors.push(ConfigValidationError {
                    field: "signature_algorithm".to_string(),
                    message: format!("unsupported algorithm '{}', expected sha1 or sha256", algorithm),
                });
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Name of the invalid setting
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cloudinary.toml: '{}' {}", self.field, self.message)
    }
}
