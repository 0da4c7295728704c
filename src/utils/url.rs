// src/utils/url.rs

//! URL manipulation utilities for image sources.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Schemes that embed data inline instead of pointing at a fetchable resource.
const INLINE_SCHEMES: [&str; 4] = ["data:", "blob:", "javascript:", "about:"];

/// Whether a raw `src` value is inline/embedded rather than fetchable.
pub fn is_inline_source(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    INLINE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// Resolve an image `src` to an absolute http(s) URL.
///
/// Protocol-relative sources get `https:`. Returns `None` for inline data
/// and for anything that does not end up on http or https.
///
/// # Examples
/// ```
/// use harvester::utils::url::resolve_image_url;
///
/// assert_eq!(
///     resolve_image_url(None, "//pic1.zhimg.com/v2-ab.jpg").as_deref(),
///     Some("https://pic1.zhimg.com/v2-ab.jpg")
/// );
/// assert_eq!(resolve_image_url(None, "data:image/png;base64,AAAA"), None);
/// ```
pub fn resolve_image_url(base: Option<&Url>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || is_inline_source(src) {
        return None;
    }

    let resolved = if let Some(rest) = src.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else {
        match base {
            Some(base) => base.join(src).ok()?,
            None => Url::parse(src).ok()?,
        }
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn identity_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^(v\d+-[0-9a-f]+|[0-9a-f]{16,})(?:_[^.]*)?(?:\.[a-z0-9]+)?$").ok()
        })
        .as_ref()
}

/// Derive the content-addressed identity from an image URL's last path segment.
///
/// `https://pic1.zhimg.com/v2-3f2e1a_720w.jpg?source=1` and
/// `https://pic4.zhimg.com/80/v2-3f2e1a_hd.png` both yield `v2-3f2e1a`.
pub fn image_identity(image_url: &str) -> Option<String> {
    let parsed = Url::parse(image_url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let caps = identity_pattern()?.captures(last)?;
    caps.get(1).map(|m| m.as_str().to_ascii_lowercase())
}

/// Infer a file extension from the URL path, `jpg` when ambiguous.
pub fn infer_extension(image_url: &str) -> &'static str {
    let path = Url::parse(image_url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| image_url.to_ascii_lowercase());

    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "jpg"
    } else if path.ends_with(".png") {
        "png"
    } else if path.ends_with(".gif") {
        "gif"
    } else if path.ends_with(".webp") {
        "webp"
    } else if path.ends_with(".svg") {
        "svg"
    } else {
        "jpg"
    }
}

/// Stable digest of a URL without query or fragment.
pub fn url_digest(image_url: &str) -> String {
    let normalized = match Url::parse(image_url) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => image_url.to_string(),
    };
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..16])
}
