//! Url command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::config::{environment_options, load_config, resolve_config, ConfigError};
use crate::url::Client;
use crate::util::Options;

use super::{parse_options, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the url command
///
/// Configuration comes from `cloudinary.toml` (given or discovered) and
/// `CLOUDINARY_URL`; `-o` options apply per call.
pub fn run_url(public_id: &str, pairs: &[String], config_path: Option<&Path>) -> ExitCode {
    let options = match parse_options(pairs) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let file = match load_config(config_path) {
        Ok(file) => file,
        Err(ConfigError::Io(e)) if config_path.is_some() => {
            eprintln!("Error: Cannot read config file: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let environment = environment_options();
    let config = resolve_config(Some(&file), environment.as_ref(), None, &Options::new());
    let client = Client::new(config);

    match client.url(public_id, &options) {
        Ok(url) => {
            println!("{}", url);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
