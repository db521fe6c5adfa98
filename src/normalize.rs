//! Per-parameter value normalizers
//!
//! Each function takes the raw option value and returns the canonical value
//! that the parameter serializes. Unrecognized shapes pass through untouched.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::expression::{normalize, normalize_value};
use crate::util::value_token;

/// Rewrite a leading `#` to `rgb:` (`#ff0000` → `rgb:ff0000`).
pub fn norm_color(value: &Value) -> Value {
    match value {
        Value::String(s) => match s.strip_prefix('#') {
            Some(hex) => Value::String(format!("rgb:{}", hex)),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Render `{width, color}` as `<width>px_solid_<color>`; width defaults to 2, color to black.
pub fn norm_border(value: &Value) -> Value {
    let Value::Object(border) = value else {
        return value.clone();
    };
    let width = border.get("width").filter(|v| !v.is_null()).cloned().unwrap_or(Value::from(2));
    let color = border.get("color").filter(|v| !v.is_null()).cloned().unwrap_or(Value::from("black"));
    Value::String(format!("{}px_solid_{}", value_token(&width), value_token(&norm_color(&color))))
}

/// Integer ratios gain a trailing `.0`; anything else is treated as an expression.
pub fn norm_dpr(value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let dpr = value_token(value);
    if !dpr.is_empty() && dpr.bytes().all(|b| b.is_ascii_digit()) {
        Value::String(format!("{}.0", dpr))
    } else {
        Value::String(normalize(&dpr))
    }
}

/// A frame-rate range given as an array is joined with `-`.
pub fn norm_fps(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            Value::String(items.iter().map(value_token).collect::<Vec<_>>().join("-"))
        }
        other => other.clone(),
    }
}

/// Build `codec[:profile[:level[:bframes_no]]]` from a structured codec description.
///
/// A field is only used when every field before it is present. Values other
/// than strings and objects yield null.
pub fn norm_video_codec(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Object(params) => Value::String(video_codec_string(params)),
        _ => Value::Null,
    }
}

fn video_codec_string(params: &Map<String, Value>) -> String {
    let Some(codec) = params.get("codec") else {
        return String::new();
    };
    let mut video = value_token(codec);
    if let Some(profile) = params.get("profile") {
        video.push(':');
        video.push_str(&value_token(profile));
        if let Some(level) = params.get("level") {
            video.push(':');
            video.push_str(&value_token(level));
            if params.get("b_frames") == Some(&Value::Bool(false)) {
                video.push_str(":bframes_no");
            }
        }
    }
    video
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(([0-9]*)\.([0-9]+)|([0-9]+))([%pP])?$").expect("range pattern is valid")
    })
}

/// Normalize an offset or duration: `35%` → `35p`, `2.5` → `2.5`, anything else as an expression.
pub fn norm_range_value(value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let text = value_token(value);
    match range_re().captures(&text) {
        Some(caps) => {
            let modifier = if caps.get(5).is_some() { "p" } else { "" };
            Value::String(format!("{}{}", &caps[1], modifier))
        }
        None => normalize_value(value),
    }
}
