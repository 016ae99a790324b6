//! URL classification and destination path derivation.

use std::path::{Path, PathBuf};

use url::Url;

/// Filename used when a URL path has no usable basename.
pub const FALLBACK_FILENAME: &str = "download";

/// Returns true when `url` points at one of `video_domains` (or a subdomain).
///
/// Scheme-less input such as `youtu.be/abc` is accepted.
#[must_use]
pub fn is_streaming_video_url<S: AsRef<str>>(url: &str, video_domains: &[S]) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    video_domains.iter().any(|domain| {
        let domain = domain.as_ref().trim().to_ascii_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

fn host_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => parsed,
        _ => Url::parse(&format!("https://{trimmed}")).ok()?,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(ToString::to_string)
}

/// Derives the local file path for an HTTP download.
///
/// Uses the percent-decoded basename of the URL path, joined under
/// `downloads_dir`. Two URLs with the same basename map to the same file.
#[must_use]
pub fn destination_for(url: &str, downloads_dir: &Path) -> PathBuf {
    downloads_dir.join(filename_from_url(url))
}

/// Percent-decoded basename of the URL path, or [`FALLBACK_FILENAME`].
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return FALLBACK_FILENAME.to_string();
    };
    let decoded = urlencoding::decode(parsed.path())
        .map_or_else(|_| parsed.path().to_string(), |cow| cow.into_owned());
    let basename = decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if basename.is_empty() || basename == "." || basename == ".." || basename.contains('\0') {
        FALLBACK_FILENAME.to_string()
    } else {
        basename.to_string()
    }
}
