//! cldurl - Media delivery URL builder
//!
//! This library provides functionality to:
//! - Build transformation chains and serialize them to the compact
//!   `c_fill,w_100/e_sepia` wire form
//! - Normalize conditional and arithmetic expressions
//! - Assemble delivery URLs with CDN sharding, versioning and signing
//! - Rewrite `w_auto` / `dpr_auto` URLs for responsive images

pub mod cli;
pub mod config;
pub mod crc32;
pub mod expression;
pub mod layer;
pub mod normalize;
pub mod page;
pub mod param;
pub mod responsive;
pub mod transformation;
pub mod url;
pub mod util;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{ConfigError, Configuration};
pub use expression::{Condition, Expression};
pub use layer::LayerError;
pub use page::{Location, PageContext};
pub use transformation::{ParamName, Transformation};
pub use url::{Client, UrlError};
