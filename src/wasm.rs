//! WASM API module for browser/JS interop
//!
//! Provides WebAssembly bindings for building delivery URLs and
//! transformation strings from JSON options.

use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::config::Configuration;
use crate::expression::normalize;
use crate::page::{Location, PageContext};
use crate::transformation::Transformation;
use crate::url::Client;
use crate::util::Options;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    #[cfg(feature = "wasm")]
    console_error_panic_hook::set_once();
}

/// Result of building a URL or transformation string.
#[wasm_bindgen]
pub struct BuildResult {
    value: String,
    error: Option<String>,
}

#[wasm_bindgen]
impl BuildResult {
    /// The built string (empty on error)
    #[wasm_bindgen(getter)]
    pub fn value(&self) -> String {
        self.value.clone()
    }

    /// The error message, if building failed
    #[wasm_bindgen(getter)]
    pub fn error(&self) -> Option<String> {
        self.error.clone()
    }
}

impl BuildResult {
    fn ok(value: String) -> Self {
        Self { value, error: None }
    }

    fn err(message: impl ToString) -> Self {
        Self { value: String::new(), error: Some(message.to_string()) }
    }
}

fn parse_object(json: &str) -> Result<Options, String> {
    if json.trim().is_empty() {
        return Ok(Options::new());
    }
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

/// Build a delivery URL.
///
/// # Arguments
/// * `public_id` - public id, or remote URL for fetch delivery
/// * `options_json` - per-call options as a JSON object
/// * `config_json` - client configuration as a JSON object
/// * `href` - the page location, used for relative fetch URLs and the default protocol
#[wasm_bindgen]
pub fn build_url(public_id: &str, options_json: &str, config_json: &str, href: Option<String>) -> BuildResult {
    let (options, config) = match (parse_object(options_json), parse_object(config_json)) {
        (Ok(options), Ok(config)) => (options, config),
        (Err(e), _) | (_, Err(e)) => return BuildResult::err(e),
    };

    let location = href.as_deref().and_then(Location::parse);
    let mut configuration = Configuration::with_defaults();
    if let Some(location) = &location {
        configuration.set("secure", location.is_secure());
    }
    configuration.merge(&config);

    let mut client = Client::new(configuration);
    if let Some(location) = location {
        client = client.with_page(PageContext::new().with_location(location));
    }

    match client.url(public_id, &options) {
        Ok(url) => BuildResult::ok(url),
        Err(e) => BuildResult::err(e),
    }
}

/// Serialize transformation options (object, array of links or named transformation) given as JSON.
#[wasm_bindgen]
pub fn transformation_string(options_json: &str) -> BuildResult {
    let options = match serde_json::from_str::<Value>(options_json) {
        Ok(value) => value,
        Err(e) => return BuildResult::err(format!("invalid JSON: {}", e)),
    };
    match Transformation::from_options(&options).serialize() {
        Ok(serialized) => BuildResult::ok(serialized),
        Err(e) => BuildResult::err(e),
    }
}

/// Normalize an expression.
#[wasm_bindgen]
pub fn normalize_expression(text: &str) -> String {
    normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let result = build_url("sample", r#"{"crop": "fill", "width": 100}"#, r#"{"cloud_name": "demo"}"#, None);
        assert_eq!(result.error(), None);
        assert_eq!(result.value(), "http://res.cloudinary.com/demo/image/upload/c_fill,w_100/sample");
    }

    #[test]
    fn test_build_url_secure_page() {
        let result = build_url("sample", "", r#"{"cloud_name": "demo"}"#, Some("https://site.com/a".to_string()));
        assert_eq!(result.value(), "https://res.cloudinary.com/demo/image/upload/sample");
    }

    #[test]
    fn test_build_url_relative_fetch() {
        let result = build_url(
            "/logo.png",
            r#"{"type": "fetch"}"#,
            r#"{"cloud_name": "demo"}"#,
            Some("http://site.com/a/b.html".to_string()),
        );
        assert_eq!(result.value(), "http://res.cloudinary.com/demo/image/fetch/http://site.com/logo.png");
    }

    #[test]
    fn test_build_url_errors() {
        let missing = build_url("sample", "{}", "{}", None);
        assert!(missing.value().is_empty());
        assert_eq!(missing.error().as_deref(), Some("Unknown cloud_name"));

        let bad_json = build_url("sample", "{", "{}", None);
        assert!(bad_json.error().is_some_and(|e| e.contains("invalid JSON")));
    }

    #[test]
    fn test_transformation_string() {
        let result = transformation_string(r#"[{"crop": "fit", "width": 10}, {"angle": 15}]"#);
        assert_eq!(result.value(), "c_fit,w_10/a_15");
        assert!(transformation_string("not json").error().is_some());
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(normalize_expression("width > 100 && face_count < 2"), "w_gt_100_and_fc_lt_2");
    }
}
