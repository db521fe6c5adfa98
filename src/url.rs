//! Delivery URL assembly
//!
//! A [`Client`] owns resolved configuration and, optionally, the page it runs
//! in. [`Client::url`] merges call options over the configuration, serializes
//! the transformation and lays out:
//!
//! ```text
//! <prefix>/<resource_type>/<type>/[s--<signature>--/]<transformation>/[v<version>/]<public_id>[.<format>]
//! ```

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::{resolve_config, environment_options, Configuration};
use crate::crc32::crc32;
use crate::layer::LayerError;
use crate::page::{is_absolute_http, PageContext};
use crate::transformation::Transformation;
use crate::util::{decode_uri_component, encode_uri_component, fully_unescape, truthy, value_token, Options};

/// The shared delivery host.
pub const SHARED_CDN: &str = "res.cloudinary.com";
/// The retired shared Akamai host, treated like [`SHARED_CDN`].
pub const OLD_AKAMAI_SHARED_CDN: &str = "cloudinary-a.akamaihd.net";

/// `resource_type/type` pairs that have an SEO-friendly path.
pub const SEO_TYPES: &[(&str, &str)] = &[
    ("image/upload", "images"),
    ("image/private", "private_images"),
    ("image/authenticated", "authenticated_images"),
    ("raw/upload", "files"),
    ("video/upload", "videos"),
];

/// Errors raised while assembling a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UrlError {
    /// No `cloud_name` in options or configuration
    #[error("Unknown cloud_name")]
    MissingCloudName,
    /// `url_suffix` containing `.` or `/`
    #[error("url_suffix should not include . or /")]
    InvalidUrlSuffix,
    /// `use_root_path` for anything but image/upload
    #[error("Root path only supported for image/upload")]
    RootPathUnsupported,
    /// `url_suffix` for a resource/delivery type pair without an SEO path
    #[error("URL Suffix only supported for {}", SEO_TYPES.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", "))]
    SeoUnsupported,
    /// A relative fetch URL with no page to resolve it against
    #[error("Relative fetch URL '{0}' needs a page location")]
    RelativeFetchWithoutPage(String),
    /// `sign_url` without `api_secret`
    #[error("Must supply api_secret to sign URLs")]
    MissingApiSecret,
    /// A signature algorithm other than sha1 or sha256
    #[error("Unsupported signature algorithm '{0}'")]
    UnsupportedSignatureAlgorithm(String),
    /// An overlay or underlay that could not be rendered
    #[error(transparent)]
    Layer(#[from] LayerError),
}

/// Parameters every URL starts from.
pub fn default_image_params() -> Options {
    let mut defaults = Options::new();
    defaults.insert("resource_type".to_string(), Value::from("image"));
    defaults.insert("transformation".to_string(), Value::Array(Vec::new()));
    defaults.insert("type".to_string(), Value::from("upload"));
    defaults
}

/// CDN shard (1 to 5) for a public id.
pub fn cdn_subdomain_number(public_id: &str) -> u32 {
    crc32(public_id) % 5 + 1
}

fn repeated_slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([^:])/+").expect("slash pattern is valid"))
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v[0-9]+").expect("version pattern is valid"))
}

fn image_extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(jpg|png|gif|webp)$").expect("extension pattern is valid"))
}

fn encode_public_id(public_id: &str) -> String {
    encode_uri_component(public_id).replace("%3A", ":").replace("%2F", "/")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// The `resource_type/type` path segment.
///
/// A URL suffix switches to the SEO path, `use_root_path` drops the segment
/// for image uploads and `shorten` abbreviates image uploads to `iu`.
pub fn finalize_resource_type(
    resource_type: &str,
    delivery_type: &str,
    url_suffix: Option<&str>,
    use_root_path: bool,
    shorten: bool,
) -> Result<String, UrlError> {
    let mut resource_type = Some(resource_type.to_string());
    let mut delivery_type = Some(delivery_type.to_string());

    if url_suffix.map_or(false, |s| !s.is_empty()) {
        let key = format!("{}/{}", resource_type.as_deref().unwrap_or_default(), delivery_type.as_deref().unwrap_or_default());
        let seo = SEO_TYPES.iter().find(|(pair, _)| *pair == key).map(|(_, seo)| seo.to_string());
        if seo.is_none() {
            return Err(UrlError::SeoUnsupported);
        }
        resource_type = seo;
        delivery_type = None;
    }

    if use_root_path {
        let image_upload = resource_type.as_deref() == Some("image") && delivery_type.as_deref() == Some("upload");
        if image_upload || resource_type.as_deref() == Some("images") {
            resource_type = None;
            delivery_type = None;
        } else {
            return Err(UrlError::RootPathUnsupported);
        }
    }

    if shorten && resource_type.as_deref() == Some("image") && delivery_type.as_deref() == Some("upload") {
        resource_type = Some("iu".to_string());
        delivery_type = None;
    }

    Ok([resource_type.unwrap_or_default(), delivery_type.unwrap_or_default()].join("/"))
}

/// `protocol://[cdn-]subdomain.host/cloud` for a public id.
fn url_prefix(public_id: &str, options: &Configuration) -> String {
    let cloud_name = options.get_str("cloud_name").unwrap_or_default();
    if cloud_name.starts_with('/') {
        return format!("/res{}", cloud_name);
    }

    let mut protocol = "http://".to_string();
    let mut cdn_part = String::new();
    let mut subdomain = "res".to_string();
    let mut host = ".cloudinary.com".to_string();
    let mut path = format!("/{}", cloud_name);

    if let Some(p) = non_empty(options.get_str("protocol")) {
        protocol = format!("{}//", p);
    }
    if options.flag("private_cdn") {
        cdn_part = format!("{}-", cloud_name);
        path.clear();
    }
    if options.flag("cdn_subdomain") {
        subdomain = format!("res-{}", cdn_subdomain_number(public_id));
    }

    if options.flag("secure") {
        protocol = "https://".to_string();
        // Only an explicit false resets the shard. Meta tags and URL query
        // strings carry it as the text "false" or "0".
        let explicit = options.get("secure_cdn_subdomain").is_some_and(|v| !v.is_null());
        if explicit && !options.flag("secure_cdn_subdomain") {
            subdomain = "res".to_string();
        }
        if let Some(distribution) = non_empty(options.get_str("secure_distribution")) {
            if distribution != OLD_AKAMAI_SHARED_CDN && distribution != SHARED_CDN {
                cdn_part.clear();
                subdomain.clear();
                host = distribution;
            }
        }
    } else if let Some(cname) = non_empty(options.get_str("cname")) {
        protocol = "http://".to_string();
        cdn_part.clear();
        subdomain = if options.flag("cdn_subdomain") {
            format!("a{}.", cdn_subdomain_number(public_id))
        } else {
            String::new()
        };
        host = cname;
    }

    [protocol, cdn_part, subdomain, host, path].concat()
}

/// `s--<signature>--` over the transformation and public id.
///
/// SHA-1 unless `signature_algorithm` says otherwise. Long signatures are
/// always SHA-256.
fn sign(to_sign: &str, options: &Configuration) -> Result<String, UrlError> {
    let long = options.flag("long_url_signature");
    let algorithm = if long {
        "sha256".to_string()
    } else {
        non_empty(options.get_str("signature_algorithm")).unwrap_or_else(|| "sha1".to_string())
    };
    let secret = non_empty(options.get_str("api_secret")).ok_or(UrlError::MissingApiSecret)?;

    let input = format!("{}{}", fully_unescape(to_sign), secret);
    let digest = match algorithm.as_str() {
        "sha1" => Sha1::digest(input.as_bytes()).to_vec(),
        "sha256" => Sha256::digest(input.as_bytes()).to_vec(),
        _ => return Err(UrlError::UnsupportedSignatureAlgorithm(algorithm)),
    };
    let encoded = URL_SAFE.encode(digest);
    let length = if long { 32 } else { 8 };
    Ok(format!("s--{}--", &encoded[..length]))
}

/// A delivery client: configuration plus the optional host page.
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: Configuration,
    page: Option<PageContext>,
}

impl Client {
    pub fn new(config: Configuration) -> Self {
        Self { config, page: None }
    }

    /// Build from explicit options layered over the defaults and `CLOUDINARY_URL`.
    pub fn from_options(explicit: &Options) -> Self {
        let environment = environment_options();
        Self::new(resolve_config(None, environment.as_ref(), None, explicit))
    }

    pub fn with_page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    pub fn page(&self) -> Option<&PageContext> {
        self.page.as_ref()
    }

    fn absolutize(&self, url: &str) -> Result<String, UrlError> {
        if is_absolute_http(url) {
            return Ok(url.to_string());
        }
        match self.page.as_ref().and_then(|page| page.location.as_ref()) {
            Some(location) => Ok(location.absolutize(url)),
            None => Err(UrlError::RelativeFetchWithoutPage(url.to_string())),
        }
    }

    /// The delivery URL for `public_id`.
    ///
    /// An empty id yields an empty URL. Call options win over configuration,
    /// which wins over [`default_image_params`].
    pub fn url(&self, public_id: &str, options: &Options) -> Result<String, UrlError> {
        if public_id.is_empty() {
            return Ok(String::new());
        }

        let mut merged = options.clone();
        for (key, value) in self.config.options().iter().chain(default_image_params().iter()) {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        let mut opts = Configuration::from_options(merged);
        let mut public_id = public_id.to_string();

        let delivery_type = opts.get_str("type").unwrap_or_else(|| "upload".to_string());
        if delivery_type == "fetch" {
            if !opts.get("fetch_format").map_or(false, truthy) {
                if let Some(format) = opts.get("format").filter(|v| truthy(v)).cloned() {
                    opts.set("fetch_format", format);
                }
            }
            public_id = self.absolutize(&public_id)?;
        }

        let transformation = Transformation::from_map(opts.options()).serialize()?;

        let cloud_name = non_empty(opts.get_str("cloud_name")).ok_or(UrlError::MissingCloudName)?;

        let has_version = opts.get_str("version").map_or(false, |v| !v.is_empty());
        if public_id.contains('/') && !version_re().is_match(&public_id) && !is_absolute_http(&public_id) && !has_version {
            opts.set("version", 1);
        }

        let url_suffix = non_empty(opts.get_str("url_suffix"));
        let source_to_sign;
        if public_id.starts_with("http:") || public_id.starts_with("https:") {
            if delivery_type == "upload" || delivery_type == "asset" {
                debug!(public_id = %public_id, "passing through remote url");
                return Ok(public_id);
            }
            public_id = encode_public_id(&public_id);
            source_to_sign = public_id.clone();
        } else {
            let decoded = decode_uri_component(&public_id).unwrap_or_else(|| public_id.clone());
            public_id = encode_public_id(&decoded);
            let mut signed_source = public_id.clone();
            if let Some(suffix) = &url_suffix {
                if suffix.contains('.') || suffix.contains('/') {
                    return Err(UrlError::InvalidUrlSuffix);
                }
                public_id = format!("{}/{}", public_id, suffix);
            }
            if let Some(format) = opts.get("format").filter(|v| truthy(v)).map(value_token) {
                if !opts.flag("trust_public_id") {
                    public_id = image_extension_re().replace(&public_id, "").into_owned();
                    signed_source = image_extension_re().replace(&signed_source, "").into_owned();
                }
                public_id = format!("{}.{}", public_id, format);
                signed_source = format!("{}.{}", signed_source, format);
            }
            source_to_sign = signed_source;
        }

        let prefix = url_prefix(&public_id, &opts);
        let resource_type = opts.get_str("resource_type").unwrap_or_else(|| "image".to_string());
        let resource_and_type = finalize_resource_type(
            &resource_type,
            &delivery_type,
            url_suffix.as_deref(),
            opts.flag("use_root_path"),
            opts.flag("shorten"),
        )?;

        let signed = opts.flag("sign_url");
        let signature = if signed {
            let to_sign = [transformation.as_str(), source_to_sign.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("/");
            sign(&to_sign, &opts)?
        } else {
            String::new()
        };

        let version = match opts.get("version") {
            Some(v) if truthy(v) => format!("v{}", value_token(v)),
            _ => String::new(),
        };

        let url = [prefix, resource_and_type, signature, transformation, version, public_id.clone()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let url = repeated_slash_re().replace_all(&url, "$1/").into_owned();

        debug!(
            public_id = %public_id,
            shard = opts.flag("cdn_subdomain").then(|| cdn_subdomain_number(&public_id)),
            signed,
            "assembled url"
        );
        Ok(url)
    }

    /// The URL for a public id rendered with a built transformation.
    pub fn url_with(&self, public_id: &str, transformation: &Transformation) -> Result<String, UrlError> {
        self.url(public_id, &transformation.to_options(true))
    }

    /// A video URL (`resource_type` defaults to `video`).
    pub fn video_url(&self, public_id: &str, options: &Options) -> Result<String, UrlError> {
        let mut merged = Options::new();
        merged.insert("resource_type".to_string(), Value::from("video"));
        merged.extend(options.clone());
        self.url(public_id, &merged)
    }

    /// A video poster URL (`video` resource, `jpg` format unless overridden).
    pub fn video_thumbnail_url(&self, public_id: &str, options: &Options) -> Result<String, UrlError> {
        let mut merged = Options::new();
        merged.insert("format".to_string(), Value::from("jpg"));
        merged.insert("resource_type".to_string(), Value::from("video"));
        merged.extend(options.clone());
        self.url(public_id, &merged)
    }

    /// The stylesheet URL of a sprite.
    pub fn sprite_css(&self, public_id: &str, options: &Options) -> Result<String, UrlError> {
        let mut merged = Options::new();
        merged.insert("type".to_string(), Value::from("sprite"));
        merged.extend(options.clone());
        if !public_id.ends_with("css") {
            merged.insert("format".to_string(), Value::from("css"));
        }
        self.url(public_id, &merged)
    }

    /// Serialize transformation options without building a URL.
    pub fn transformation_string(&self, options: &Value) -> Result<String, UrlError> {
        Ok(Transformation::from_options(options).serialize()?)
    }
}
