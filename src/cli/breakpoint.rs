//! Breakpoint command implementation

use std::process::ExitCode;

use crate::responsive::Breakpoints;

use super::{EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Print the width requested for a container `width` wide.
pub fn run_breakpoint(width: u32, steps: Option<u32>, breakpoints: Option<&str>) -> ExitCode {
    let breakpoints = match breakpoints {
        Some(csv) => match Breakpoints::parse(csv) {
            Breakpoints::List(points) if points.is_empty() => {
                eprintln!("Error: No valid widths in '{}'", csv);
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
            parsed => parsed,
        },
        None => Breakpoints::Default,
    };

    println!("{}", breakpoints.calc(width, steps));
    ExitCode::from(EXIT_SUCCESS)
}
