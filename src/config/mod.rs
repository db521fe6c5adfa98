//! Delivery configuration
//!
//! Provides the settings bag and loading of `cloudinary.toml`, the
//! `CLOUDINARY_URL` environment variable and page meta tags.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
