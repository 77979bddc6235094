//! Endpoint URL assembly.

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Joins `endpoint` onto `base_url` with exactly one slash between them.
///
/// ```
/// use murmur::utils::url::api_url;
///
/// assert_eq!(
///     api_url("https://api.example.com/v1///", "/audio/speech"),
///     "https://api.example.com/v1/audio/speech"
/// );
/// ```
pub fn api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Accepts only absolute http(s) URLs with a host, so a typo in the config
/// fails at `murmur set` time rather than on the first request.
pub fn validate_base_url(base_url: &str) -> Result<String, String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| format!("Base URL must start with http:// or https://: {base_url}"))?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(format!("Base URL has no host: {base_url}"));
    }
    Ok(trimmed.to_string())
}
