//! Host page capability
//!
//! Browser-hosted callers describe the page they run in: its location (for
//! absolutizing relative fetch URLs and picking the default protocol), its
//! `cloudinary_*` meta tags and its device pixel ratio. Everything is optional;
//! a client without a page falls back to defaults.

/// The parts of `window.location` the URL assembler reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Scheme with trailing colon, e.g. `https:`
    pub protocol: String,
    /// Host with optional port
    pub host: String,
    pub pathname: String,
}

impl Location {
    pub fn new(protocol: &str, host: &str, pathname: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            pathname: pathname.to_string(),
        }
    }

    /// Parse `scheme://host/path`. Query and fragment are dropped.
    pub fn parse(href: &str) -> Option<Self> {
        let (scheme, rest) = href.split_once("://")?;
        if scheme.is_empty() || rest.is_empty() {
            return None;
        }
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        Some(Self::new(&format!("{}:", scheme), host, path))
    }

    pub fn is_secure(&self) -> bool {
        self.protocol == "https:"
    }

    /// Resolve `url` against this location.
    ///
    /// Absolute `http(s):` URLs are returned unchanged. A leading `?` keeps the
    /// current path, a leading `/` is host-relative and anything else is
    /// relative to the current directory.
    pub fn absolutize(&self, url: &str) -> String {
        if is_absolute_http(url) {
            return url.to_string();
        }
        let mut prefix = format!("{}//{}", self.protocol, self.host);
        if url.starts_with('?') {
            prefix.push_str(&self.pathname);
        } else if !url.starts_with('/') {
            let dir = match self.pathname.rfind('/') {
                Some(i) => &self.pathname[..=i],
                None => "/",
            };
            prefix.push_str(dir);
        }
        format!("{}{}", prefix, url)
    }
}

pub(crate) fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http:/") || url.starts_with("https:/")
}

/// The page a client is embedded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub location: Option<Location>,
    /// `(name, content)` pairs of the page's meta tags
    pub meta: Vec<(String, String)>,
    pub device_pixel_ratio: Option<f64>,
}

impl PageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.push((name.to_string(), content.to_string()));
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = Some(ratio);
        self
    }

    pub fn is_secure(&self) -> bool {
        self.location.as_ref().map_or(false, Location::is_secure)
    }

    /// Meta tags named `cloudinary_<key>`, with the prefix removed.
    pub fn config_meta(&self) -> impl Iterator<Item = (&str, &str)> {
        self.meta
            .iter()
            .filter_map(|(name, content)| name.strip_prefix("cloudinary_").map(|key| (key, content.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_location() -> Location {
        Location::new("https:", "example.com:8080", "/gallery/index.html")
    }

    #[test]
    fn test_absolutize_keeps_absolute_urls() {
        let loc = page_location();
        assert_eq!(loc.absolutize("http://other.org/a.png"), "http://other.org/a.png");
        assert_eq!(loc.absolutize("https://other.org/a.png"), "https://other.org/a.png");
    }

    #[test]
    fn test_absolutize_relative_forms() {
        let loc = page_location();
        assert_eq!(loc.absolutize("/img/a.png"), "https://example.com:8080/img/a.png");
        assert_eq!(loc.absolutize("img/a.png"), "https://example.com:8080/gallery/img/a.png");
        assert_eq!(loc.absolutize("?page=2"), "https://example.com:8080/gallery/index.html?page=2");
    }

    #[test]
    fn test_parse_location() {
        let loc = Location::parse("http://example.com/a/b.html?x=1#top").expect("should parse href");
        assert_eq!(loc, Location::new("http:", "example.com", "/a/b.html"));
        assert!(!loc.is_secure());
        assert_eq!(Location::parse("example.com"), None);
        assert_eq!(Location::parse("https://host").expect("should parse bare host").pathname, "/");
    }

    #[test]
    fn test_config_meta_strips_prefix() {
        let page = PageContext::new()
            .with_meta("cloudinary_cloud_name", "demo")
            .with_meta("viewport", "width=device-width")
            .with_meta("cloudinary_secure", "true");
        let meta: Vec<_> = page.config_meta().collect();
        assert_eq!(meta, vec![("cloud_name", "demo"), ("secure", "true")]);
    }

    #[test]
    fn test_secure_follows_location() {
        assert!(PageContext::new().with_location(page_location()).is_secure());
        assert!(!PageContext::new().is_secure());
    }
}
