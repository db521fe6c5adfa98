//! cldurl - Command-line tool for building media delivery URLs

use std::process::ExitCode;

use cldurl::cli;

fn main() -> ExitCode {
    cli::run()
}
