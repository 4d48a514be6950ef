//! Endpoint URL helpers.
//!
//! The backend is configured as one base URL plus endpoint paths; endpoints
//! may also be given as absolute URLs when chat and upload live on different
//! hosts.

/// Strip trailing slashes so endpoints can be appended safely.
///
/// ```
/// use docchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:5000/"), "http://localhost:5000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join `endpoint` onto `base_url`, unless `endpoint` is already absolute.
///
/// ```
/// use docchat::utils::url::resolve_endpoint;
///
/// assert_eq!(
///     resolve_endpoint("http://localhost:5000/", "/chat"),
///     "http://localhost:5000/chat"
/// );
/// assert_eq!(
///     resolve_endpoint("http://localhost:5000", "https://files.example.com/upload"),
///     "https://files.example.com/upload"
/// );
/// ```
pub fn resolve_endpoint(base_url: &str, endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if is_absolute(endpoint) {
        return endpoint.to_string();
    }
    let base = normalize_base_url(base_url);
    let path = endpoint.trim_start_matches('/');
    if path.is_empty() {
        base
    } else {
        format!("{base}/{path}")
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
