//! Responsive image helpers
//!
//! Rewrites `dpr_auto` and `w_auto` tokens of an already-built URL against
//! the device pixel ratio and the measured width of the image's container.
//! The caller measures; this module only decides which URL to load.
//!
//! Resize handling is explicit state on [`Responsive`]: feed it resize events
//! and poll it, and re-run [`Responsive::update`] for every image when a poll
//! reports that the debounce interval has passed.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::config::Configuration;
use crate::page::PageContext;
use crate::util::{format_number, parse_float_prefix, truthy, value_token};

/// Step used by [`default_breakpoint`] when none is given.
pub const DEFAULT_BREAKPOINT_STEP: u32 = 100;

/// Debounce applied to resize events when `responsive_debounce` is not set.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Round `width` up to the next multiple of `steps` (default 100). Widths
/// whose next multiple does not fit in a `u32` are returned unchanged.
pub fn default_breakpoint(width: u32, steps: Option<u32>) -> u32 {
    let steps = steps.filter(|s| *s > 0).unwrap_or(DEFAULT_BREAKPOINT_STEP);
    width.div_ceil(steps).checked_mul(steps).unwrap_or(width)
}

/// The smallest entry of a sorted list that is at least `value`, or the
/// largest entry when none is.
pub fn closest_above(list: &[u32], value: u32) -> Option<u32> {
    let mut i = list.len().checked_sub(1)?;
    while i > 0 && list[i - 1] >= value {
        i -= 1;
    }
    Some(list[i])
}

/// How a container width is turned into a requested width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Breakpoints {
    /// [`default_breakpoint`] with the step from the `w_auto:<step>` token
    #[default]
    Default,
    /// Fixed widths, ascending
    List(Vec<u32>),
}

impl Breakpoints {
    /// Parse comma-separated widths. Entries that do not start with a number
    /// are dropped; the rest are sorted.
    pub fn parse(csv: &str) -> Self {
        let mut points: Vec<u32> = csv
            .split(',')
            .filter_map(|point| parse_float_prefix(point).filter(|p| *p >= 0.0).map(|p| p.trunc() as u32))
            .collect();
        points.sort_unstable();
        Breakpoints::List(points)
    }

    /// A `breakpoints` setting: a CSV string, an array of widths, or anything
    /// else for the default step function.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(csv) if !csv.is_empty() => Self::parse(csv),
            Value::Array(items) => Self::parse(&items.iter().map(value_token).collect::<Vec<_>>().join(",")),
            _ => Breakpoints::Default,
        }
    }

    pub fn calc(&self, width: u32, steps: Option<u32>) -> u32 {
        match self {
            Breakpoints::Default => default_breakpoint(width, steps),
            Breakpoints::List(points) => closest_above(points, width).unwrap_or(width),
        }
    }
}

/// The `responsive_use_breakpoints` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseBreakpoints {
    Always,
    Never,
    /// Exact width on first render, breakpoints once the window resizes
    OnResize,
}

impl UseBreakpoints {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s == "resize" => UseBreakpoints::OnResize,
            Some(Value::String(s)) if s == "false" => UseBreakpoints::Never,
            Some(v) if truthy(v) => UseBreakpoints::Always,
            _ => UseBreakpoints::Never,
        }
    }
}

/// The DPR token for a device pixel ratio.
///
/// Missing, zero, negative and NaN ratios count as 1. Integral results get a
/// `.0` suffix (`2` → `2.0`).
pub fn device_pixel_ratio(ratio: Option<f64>, round: bool) -> String {
    let mut dpr = ratio.filter(|r| *r != 0.0 && !r.is_nan()).unwrap_or(1.0);
    if round {
        dpr = dpr.ceil();
    }
    if dpr <= 0.0 || dpr.is_nan() {
        dpr = 1.0;
    }
    let text = format_number(dpr);
    if text.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}.0", text)
    } else {
        text
    }
}

fn dpr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdpr_(1\.0|auto)\b").expect("dpr pattern is valid"))
}

fn auto_breakpoints_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"w_auto:breakpoints([_0-9]*)(:[0-9]+)?").expect("breakpoints pattern is valid"))
}

fn auto_width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"w_auto(:(\d+))?").expect("auto width pattern is valid"))
}

fn auto_width_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"w_auto[^,/]*").expect("auto width token pattern is valid"))
}

/// Replace `dpr_1.0` and `dpr_auto` tokens with `dpr_<dpr>`.
pub fn update_dpr(url: &str, dpr: &str) -> String {
    dpr_re().replace_all(url, format!("dpr_{}", dpr).as_str()).into_owned()
}

/// Debounce state for window resize events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeDebounce {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl ResizeDebounce {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce, deadline: None }
    }

    /// Record a resize event at `now`, replacing any pending deadline.
    ///
    /// Returns true when the update should run right away (zero debounce).
    pub fn record(&mut self, now: Instant) -> bool {
        if self.debounce.is_zero() {
            self.deadline = None;
            return true;
        }
        self.deadline = Some(now + self.debounce);
        false
    }

    /// Returns true once, when the pending deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for ResizeDebounce {
    fn default() -> Self {
        Self::new(DEFAULT_RESIZE_DEBOUNCE)
    }
}

/// An image under responsive control.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsiveImage {
    src: String,
    responsive: bool,
    breakpoints: Option<Breakpoints>,
    width: u32,
}

impl ResponsiveImage {
    /// An image whose `src` carries `w_auto` / `dpr_auto` tokens.
    pub fn new(src: &str) -> Self {
        Self { src: src.to_string(), responsive: true, breakpoints: None, width: 0 }
    }

    /// An image that only gets its DPR updated.
    pub fn hidpi(src: &str) -> Self {
        Self { responsive: false, ..Self::new(src) }
    }

    /// Per-image breakpoints, overriding the configured ones.
    pub fn with_breakpoints(mut self, breakpoints: Breakpoints) -> Self {
        self.breakpoints = Some(breakpoints);
        self
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// The largest width requested so far.
    pub fn width(&self) -> u32 {
        self.width
    }

    // Never shrink: a wider image is already loaded.
    fn max_width(&mut self, required: u32) -> u32 {
        if required > self.width {
            self.width = required;
        }
        self.width
    }
}

/// Responsive settings and resize state of one client.
#[derive(Debug, Clone)]
pub struct Responsive {
    use_breakpoints: UseBreakpoints,
    round_dpr: bool,
    breakpoints: Breakpoints,
    device_pixel_ratio: Option<f64>,
    resizing: bool,
    debounce: ResizeDebounce,
}

impl Responsive {
    /// Read `responsive_use_breakpoints`, `round_dpr`, `breakpoints` and
    /// `responsive_debounce` (milliseconds) from the configuration.
    pub fn from_config(config: &Configuration, page: Option<&PageContext>) -> Self {
        let debounce = config
            .get("responsive_debounce")
            .and_then(|v| parse_float_prefix(&value_token(v)))
            .filter(|ms| *ms >= 0.0)
            .map_or(DEFAULT_RESIZE_DEBOUNCE, |ms| Duration::from_millis(ms as u64));

        Self {
            use_breakpoints: UseBreakpoints::from_value(config.get("responsive_use_breakpoints")),
            round_dpr: config.get("round_dpr").map_or(true, truthy),
            breakpoints: config.get("breakpoints").map(Breakpoints::from_value).unwrap_or_default(),
            device_pixel_ratio: page.and_then(|p| p.device_pixel_ratio),
            resizing: false,
            debounce: ResizeDebounce::new(debounce),
        }
    }

    pub fn dpr(&self) -> String {
        device_pixel_ratio(self.device_pixel_ratio, self.round_dpr)
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    /// Record a window resize. Returns true when images should update now.
    pub fn resize_event(&mut self, now: Instant) -> bool {
        self.resizing = true;
        self.debounce.record(now)
    }

    /// Returns true when a debounced resize is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.debounce.poll(now)
    }

    fn apply_breakpoints(&self, image: &ResponsiveImage, width: u32, steps: Option<u32>) -> u32 {
        let exact = match self.use_breakpoints {
            UseBreakpoints::Never => true,
            UseBreakpoints::OnResize => !self.resizing,
            UseBreakpoints::Always => false,
        };
        if exact {
            return width;
        }
        image.breakpoints.as_ref().unwrap_or(&self.breakpoints).calc(width, steps)
    }

    /// The URL `image` should load for a container `container_width` wide.
    ///
    /// Returns `None` when a responsive image cannot be sized yet (no
    /// measurable container).
    pub fn update(&self, image: &mut ResponsiveImage, container_width: u32) -> Option<String> {
        let src = update_dpr(&image.src, &self.dpr());
        if !image.responsive {
            return Some(src);
        }
        if container_width == 0 {
            return None;
        }

        let updated = if auto_breakpoints_re().is_match(&src) {
            let required = image.max_width(container_width);
            auto_breakpoints_re()
                .replace(&src, |caps: &Captures| format!("w_auto:breakpoints{}:{}", &caps[1], required))
                .into_owned()
        } else if let Some(caps) = auto_width_re().captures(&src) {
            let steps = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            let required = self.apply_breakpoints(image, container_width, steps);
            let required = image.max_width(required);
            auto_width_token_re().replace_all(&src, format!("w_{}", required).as_str()).into_owned()
        } else {
            src
        };

        debug!(container_width, width = image.width, "responsive update");
        Some(updated)
    }
}

impl Default for Responsive {
    fn default() -> Self {
        Self::from_config(&Configuration::with_defaults(), None)
    }
}
