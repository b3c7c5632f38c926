//! URL validation before a request is issued.

/// Error type for URLs the fetcher refuses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a candidate URL into the form used for the request.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an absolute http(s) URL with a host
/// 3. Remove fragment (#...), which is never sent to servers
///
/// Unlike a cache key, the parsed URL may differ from the input string;
/// callers keep the original string for keying.
pub fn parse_fetch_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// True if `candidate` is an absolute URL with both scheme and host.
pub fn is_absolute_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}
