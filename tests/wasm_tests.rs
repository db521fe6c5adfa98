//! WASM tests using wasm_bindgen_test
//!
//! Run with: wasm-pack test --headless --chrome --features wasm
//! Or for node: see tests in src/wasm.rs (run with cargo test --features wasm)

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

// Configure tests to run in browser environment
wasm_bindgen_test_configure!(run_in_browser);

use cldurl::wasm::{build_url, normalize_expression, transformation_string};

const DEMO_CONFIG: &str = r#"{"cloud_name": "demo"}"#;

// ============================================================================
// build_url tests
// ============================================================================

#[wasm_bindgen_test]
fn test_build_default_url() {
    let result = build_url("sample", "{}", DEMO_CONFIG, None);
    assert_eq!(result.error(), None);
    assert_eq!(result.value(), "http://res.cloudinary.com/demo/image/upload/sample");
}

#[wasm_bindgen_test]
fn test_build_url_follows_page_protocol() {
    let result = build_url("folder/sample", "{}", DEMO_CONFIG, Some("https://site.com/gallery".to_string()));
    assert_eq!(result.value(), "https://res.cloudinary.com/demo/image/upload/v1/folder/sample");
}

#[wasm_bindgen_test]
fn test_build_url_with_transformation() {
    let result = build_url(
        "sample",
        r#"{"transformation": [{"crop": "fit", "width": 10}, {"angle": 15}], "format": "png"}"#,
        DEMO_CONFIG,
        None,
    );
    assert_eq!(result.value(), "http://res.cloudinary.com/demo/image/upload/c_fit,w_10/a_15/sample.png");
}

#[wasm_bindgen_test]
fn test_build_url_reports_errors() {
    let result = build_url("sample", r#"{"url_suffix": "a.b"}"#, DEMO_CONFIG, None);
    assert!(result.value().is_empty());
    assert!(result.error().is_some());

    let not_object = build_url("sample", "[1, 2]", DEMO_CONFIG, None);
    assert_eq!(not_object.error().as_deref(), Some("expected a JSON object"));
}

// ============================================================================
// transformation_string / normalize_expression tests
// ============================================================================

#[wasm_bindgen_test]
fn test_transformation_string_sorted() {
    let result = transformation_string(r#"{"width": 100, "height": 200, "crop": "fill"}"#);
    assert_eq!(result.value(), "c_fill,h_200,w_100");
}

#[wasm_bindgen_test]
fn test_transformation_string_suppresses_bare_width() {
    let result = transformation_string(r#"{"width": 100}"#);
    assert_eq!(result.error(), None);
    assert_eq!(result.value(), "");
}

#[wasm_bindgen_test]
fn test_normalize_expression_keeps_user_variables() {
    assert_eq!(normalize_expression("$width * 2"), "$width_mul_2");
    assert_eq!(normalize_expression("initial_height / 2"), "ih_div_2");
}
