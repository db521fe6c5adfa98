//! Transform and expr command implementations

use std::process::ExitCode;

use serde_json::Value;

use crate::expression::normalize;
use crate::transformation::Transformation;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Serialize transformation options given as JSON.
///
/// A JSON string that fails to parse is taken as a named transformation.
pub fn run_transform(json: &str) -> ExitCode {
    let options = match serde_json::from_str::<Value>(json) {
        Ok(value @ (Value::Object(_) | Value::Array(_) | Value::String(_))) => value,
        Ok(other) => {
            eprintln!("Error: Expected an object, array or string, got '{}'", other);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(_) if !json.trim_start().starts_with(['{', '[']) => Value::from(json),
        Err(e) => {
            eprintln!("Error: Invalid JSON: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    match Transformation::from_options(&options).serialize() {
        Ok(serialized) => {
            println!("{}", serialized);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Print a normalized expression.
pub fn run_expr(text: &str) -> ExitCode {
    println!("{}", normalize(text));
    ExitCode::from(EXIT_SUCCESS)
}
