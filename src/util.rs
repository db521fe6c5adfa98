//! Loose-value helpers shared by the serializer and the URL assembler
//!
//! Option values arrive as `serde_json::Value`s and are compared, rendered and
//! escaped with the same rules the delivery service's JavaScript client uses:
//! - truthiness and emptiness checks
//! - string rendering of numbers, arrays and booleans
//! - camelCase / snake_case key conversion
//! - smart escaping and URI component encoding

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use regex::Regex;
use serde_json::{Map, Value};

/// An options hash: parameter and configuration names mapped to loose values.
pub type Options = Map<String, Value>;

/// Returns true when `value` is truthy (`null`, `false`, `0`, `NaN` and `""` are falsy).
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Returns true when `value` is null, a zero-length string or array, or an object with no keys.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Format a float the way the JavaScript client prints numbers (`2.0` prints as `2`).
pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Render a value as a wire token.
///
/// Strings pass through, numbers use [`format_number`], arrays are comma-joined
/// and null renders as the empty token.
pub fn value_token(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_token).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Parse the leading float of `s`, like JavaScript's `parseFloat`.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    static FLOAT_RE: OnceLock<Regex> = OnceLock::new();
    let re = FLOAT_RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("float prefix pattern is valid")
    });
    let m = re.find(s.trim_start())?;
    match m.as_str().trim_start_matches(['+', '-']) {
        "Infinity" => {
            Some(if m.as_str().starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY })
        }
        _ => m.as_str().parse::<f64>().ok(),
    }
}

/// Returns true if the value is non-null and its leading text parses as a float.
pub fn is_number_like(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Object(_) => false,
        Value::Number(_) => true,
        other => parse_float_prefix(&value_token(other)).is_some(),
    }
}

/// Split an identifier into words the way lodash does (`fontSize`, `font_size`
/// and `FontSize` all give `["font", "size"]`).
fn words(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            words.push(chars[start..i].iter().collect());
        } else if c.is_ascii_uppercase() {
            let start = i;
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_uppercase() {
                j += 1;
            }
            let followed_by_lower = j < chars.len() && chars[j].is_ascii_lowercase();
            if followed_by_lower && j - start > 1 {
                // "HTMLWidth": the last capital starts the next word
                words.push(chars[start..j - 1].iter().collect());
                i = j - 1;
            } else if followed_by_lower {
                let mut k = j;
                while k < chars.len() && chars[k].is_ascii_lowercase() {
                    k += 1;
                }
                words.push(chars[start..k].iter().collect());
                i = k;
            } else {
                words.push(chars[start..j].iter().collect());
                i = j;
            }
        } else if c.is_ascii_lowercase() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            words.push(chars[start..i].iter().collect());
        } else {
            i += 1;
        }
    }
    words
}

/// Convert an identifier to camelCase (`audio_codec` → `audioCodec`).
pub fn camel_case(source: &str) -> String {
    words(source)
        .into_iter()
        .enumerate()
        .map(|(i, word)| {
            let word = word.to_lowercase();
            if i == 0 {
                word
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => word,
                }
            }
        })
        .collect()
}

/// Convert an identifier to snake_case (`audioCodec` → `audio_codec`).
pub fn snake_case(source: &str) -> String {
    words(source).into_iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("_")
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for b in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{:02X}", b));
    }
}

/// Characters the delivery service accepts verbatim inside a path.
fn is_path_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/' | ':')
}

/// Percent-escape every character outside `[a-zA-Z0-9_.\-/:]`.
pub fn smart_escape(source: &str) -> String {
    smart_escape_with(source, |c| !is_path_safe(c))
}

/// Percent-escape the characters selected by `unsafe_char`.
pub fn smart_escape_with(source: &str, unsafe_char: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(source.len());
    for c in source.chars() {
        if unsafe_char(c) {
            push_escaped(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out
}

fn is_uri_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
}

fn is_uri_reserved(c: char) -> bool {
    matches!(c, ';' | ',' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '#')
}

/// Percent-encode like JavaScript's `encodeURIComponent`.
pub fn encode_uri_component(source: &str) -> String {
    smart_escape_with(source, |c| !is_uri_unreserved(c))
}

/// Percent-encode like JavaScript's `encodeURI` (reserved characters survive).
pub fn encode_uri(source: &str) -> String {
    smart_escape_with(source, |c| !is_uri_unreserved(c) && !is_uri_reserved(c))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes. Returns `None` on a malformed escape or invalid UTF-8.
/// Escapes whose decoded byte satisfies `keep` are left encoded.
fn percent_decode_strict(source: &str, keep: impl Fn(u8) -> bool) -> Option<String> {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = bytes.get(i + 1).copied().and_then(hex_value)?;
            let lo = bytes.get(i + 2).copied().and_then(hex_value)?;
            let decoded = hi * 16 + lo;
            if keep(decoded) {
                out.extend_from_slice(&bytes[i..i + 3]);
            } else {
                out.push(decoded);
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Decode like JavaScript's `decodeURIComponent`; `None` when the input is malformed.
pub fn decode_uri_component(source: &str) -> Option<String> {
    percent_decode_strict(source, |_| false)
}

/// Decode like JavaScript's `decodeURI`: escapes of reserved characters are kept.
pub fn decode_uri(source: &str) -> Option<String> {
    percent_decode_strict(source, |b| b.is_ascii() && is_uri_reserved(b as char))
}

/// Decode every well-formed `%XX` escape; malformed escapes are left untouched.
pub fn percent_unescape(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = (bytes[i] == b'%')
            .then(|| {
                let hi = bytes.get(i + 1).copied().and_then(hex_value)?;
                let lo = bytes.get(i + 2).copied().and_then(hex_value)?;
                Some(hi * 16 + lo)
            })
            .flatten();
        match escape {
            Some(decoded) => {
                out.push(decoded);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Unescape repeatedly until the string stops changing (at most 10 rounds).
pub fn fully_unescape(source: &str) -> String {
    let mut current = source.to_string();
    for _ in 0..10 {
        let next = percent_unescape(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// URI-normalize a URL (decode then re-encode) and base64 it with the URL-safe alphabet.
pub fn base64_encode_url(url: &str) -> String {
    let decoded = decode_uri(url).unwrap_or_else(|| url.to_string());
    URL_SAFE.encode(encode_uri(&decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy_matches_js_rules() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!(0.5)));
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&json!(null)));
        assert!(is_empty(&json!("")));
        assert!(is_empty(&json!([])));
        assert!(is_empty(&json!({})));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
    }

    #[test]
    fn test_value_token_numbers() {
        assert_eq!(value_token(&json!(100)), "100");
        assert_eq!(value_token(&json!(2.0)), "2");
        assert_eq!(value_token(&json!(1.5)), "1.5");
        assert_eq!(value_token(&json!(-0.25)), "-0.25");
        assert_eq!(value_token(&json!(["a", 1])), "a,1");
        assert_eq!(value_token(&json!(null)), "");
    }

    #[test]
    fn test_number_like() {
        assert!(is_number_like(&json!(0)));
        assert!(is_number_like(&json!("1.3")));
        assert!(is_number_like(&json!("12px")));
        assert!(!is_number_like(&json!("")));
        assert!(!is_number_like(&json!(null)));
        assert!(!is_number_like(&json!("abc")));
    }

    #[test]
    fn test_camel_and_snake_case() {
        assert_eq!(camel_case("audio_codec"), "audioCodec");
        assert_eq!(camel_case("audioCodec"), "audioCodec");
        assert_eq!(camel_case("if"), "if");
        assert_eq!(camel_case("html_width"), "htmlWidth");
        assert_eq!(snake_case("fetchFormat"), "fetch_format");
        assert_eq!(snake_case("HTMLWidth"), "html_width");
        assert_eq!(snake_case("page_x"), "page_x");
        assert_eq!(snake_case("pageX"), "page_x");
    }

    #[test]
    fn test_smart_escape() {
        assert_eq!(smart_escape("a b"), "a%20b");
        assert_eq!(smart_escape("folder/id:1.jpg"), "folder/id:1.jpg");
        assert_eq!(smart_escape("é"), "%C3%A9");
        assert_eq!(smart_escape_with("a,b/c", |c| c == ',' || c == '/'), "a%2Cb%2Fc");
    }

    #[test]
    fn test_uri_component_round_trip() {
        assert_eq!(encode_uri_component("a b/c:d"), "a%20b%2Fc%3Ad");
        assert_eq!(decode_uri_component("a%20b%2Fc").as_deref(), Some("a b/c"));
        assert_eq!(decode_uri_component("100%"), None);
    }

    #[test]
    fn test_decode_uri_keeps_reserved_escapes() {
        assert_eq!(decode_uri("a%20b%2Fc").as_deref(), Some("a b%2Fc"));
    }

    #[test]
    fn test_fully_unescape() {
        assert_eq!(fully_unescape("a%2520b"), "a b");
        assert_eq!(fully_unescape("a+b"), "a+b");
    }

    #[test]
    fn test_base64_encode_url() {
        assert_eq!(
            base64_encode_url("http://example.com/a b.jpg"),
            URL_SAFE.encode("http://example.com/a%20b.jpg")
        );
        assert_eq!(base64_encode_url("http://x.com/a%20b"), base64_encode_url("http://x.com/a b"));
    }
}
