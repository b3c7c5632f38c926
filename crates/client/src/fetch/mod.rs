//! HTTP fetch pipeline for page metadata.
//!
//! ### Request
//! - One GET, end-to-end timeout (default 8s) covering connect, headers and body
//! - Browser-like User-Agent, `Accept`, `Accept-Language`
//! - gzip/brotli/deflate negotiated and decoded transparently
//! - Max redirects: 5 (configurable)
//!
//! ### Response Guards
//! - Non-2xx status fails with `FETCH_HTTP_ERROR`
//! - Content-Type must be HTML or XHTML; otherwise the body is never read
//! - Body capped at 1MB (configurable); the excess is dropped, not an error
//!
//! ### Decoding
//! - See [`charset`]: BOM, header, meta prescan, lossy UTF-8 fallback
//!
//! No retries happen here.

pub mod charset;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, Response, StatusCode, header};
use std::time::{Duration, Instant};

pub use charset::{CharsetSource, decode_html, sniff_encoding};
pub use self::url::{UrlError, is_absolute_url, parse_fetch_url};

use ogmeta_core::{AppConfig, Error};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: desktop Chrome)
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 1MB)
    pub max_bytes: usize,

    /// End-to-end request timeout (default: 8s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// A fetched and decoded HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: String,
    /// Decoded document text
    pub html: String,
    /// Number of body bytes kept
    pub body_bytes: usize,
    /// Whether the body was cut at the byte ceiling
    pub truncated: bool,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Something that can turn a URL into decoded HTML.
///
/// The coordinator depends on this rather than on [`FetchClient`] so that
/// alternative transports and test doubles can be plugged in.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, Error>;
}

/// HTTP fetch client with response guards.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchTransport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Fetch a URL and decode its body.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchedPage, Error> {
        let start = Instant::now();
        let url = parse_fetch_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, ACCEPT_HTML)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchHttp { status: status.as_u16() });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_html_content_type(&content_type) {
            tracing::debug!(url = %url, content_type = %content_type, "skipping non-HTML content");
            return Err(Error::UnsupportedContentType(if content_type.is_empty() {
                "missing Content-Type".to_string()
            } else {
                content_type
            }));
        }

        let final_url = response.url().clone();
        let (body, truncated) = read_capped(&mut response, self.config.max_bytes).await?;
        let html = decode_html(&body, Some(&content_type));
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes{})",
            url,
            final_url,
            fetch_ms,
            body.len(),
            if truncated { ", truncated" } else { "" }
        );

        Ok(FetchedPage { url, final_url, status, content_type, html, body_bytes: body.len(), truncated, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl PageSource for FetchClient {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, Error> {
        self.fetch(url).await
    }
}

/// True for `text/html` and `application/xhtml(+xml)` content types.
pub fn is_html_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("text/html") || lowered.contains("application/xhtml")
}

/// Read the body chunk by chunk, keeping at most `max_bytes`.
async fn read_capped(response: &mut Response, max_bytes: usize) -> Result<(Bytes, bool), Error> {
    let initial = response.content_length().map_or(16 * 1024, |len| (len as usize).min(max_bytes));
    let mut body = Vec::with_capacity(initial);

    while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
        let remaining = max_bytes - body.len();
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            return Ok((Bytes::from(body), true));
        }
        body.extend_from_slice(&chunk);
    }

    Ok((Bytes::from(body), false))
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTransport(format!("timed out: {err}"))
    } else if err.is_connect() {
        Error::FetchTransport(format!("connect failed: {err}"))
    } else {
        Error::FetchTransport(format!("network error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test Article</title></head>
<body><p>Body text for the fetch tests.</p></body>
</html>"#;

    fn client() -> FetchClient {
        FetchClient::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.max_bytes, 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("Text/HTML; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/json"));
        assert!(!is_html_content_type("image/png"));
        assert!(!is_html_content_type(""));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8"))
            .mount(&server)
            .await;

        let page = client().fetch(&format!("{}/article", server.uri())).await.unwrap();
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.html.contains("<title>Test Article</title>"));
        assert!(!page.truncated);
        assert_eq!(page.body_bytes, PAGE.len());
    }

    #[tokio::test]
    async fn test_request_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/headers"))
            .and(header_exists("user-agent"))
            .and(header_exists("accept"))
            .and(header_exists("accept-language"))
            .and(header_exists("accept-encoding"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client().fetch(&format!("{}/headers", server.uri())).await;
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[tokio::test]
    async fn test_http_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = client().fetch(&format!("{}/missing", server.uri())).await;
        assert!(matches!(result, Err(Error::FetchHttp { status: 404 })));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client().fetch(&server.uri()).await;
        assert!(matches!(result, Err(Error::FetchHttp { status: 503 })));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"))
            .mount(&server)
            .await;

        let result = client().fetch(&format!("{}/doc.pdf", server.uri())).await;
        assert!(matches!(result, Err(Error::UnsupportedContentType(ct)) if ct == "application/pdf"));
    }

    #[tokio::test]
    async fn test_body_truncated_at_ceiling() {
        let server = MockServer::start().await;
        let body = format!("<html><body>{}</body></html>", "a".repeat(10_000));
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&server)
            .await;

        let config = FetchConfig { max_bytes: 1024, ..Default::default() };
        let page = FetchClient::new(config).unwrap().fetch(&server.uri()).await.unwrap();
        assert!(page.truncated);
        assert_eq!(page.body_bytes, 1024);
        assert_eq!(page.html.len(), 1024);
    }

    #[tokio::test]
    async fn test_gzip_body_decompressed() {
        let server = MockServer::start().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAGE.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(compressed, "text/html")
                    .insert_header("content-encoding", "gzip"),
            )
            .mount(&server)
            .await;

        let page = client().fetch(&server.uri()).await.unwrap();
        assert!(page.html.contains("Test Article"));
    }

    #[tokio::test]
    async fn test_header_charset_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                b"<html><head><title>Caf\xe9 Review</title></head></html>".to_vec(),
                "text/html; charset=windows-1252",
            ))
            .mount(&server)
            .await;

        let page = client().fetch(&server.uri()).await.unwrap();
        assert!(page.html.contains("Café Review"));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(PAGE, "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig { timeout: Duration::from_millis(200), ..Default::default() };
        let result = FetchClient::new(config).unwrap().fetch(&server.uri()).await;
        assert!(matches!(result, Err(Error::FetchTransport(_))));
    }

    #[tokio::test]
    async fn test_redirect_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;

        let page = client().fetch(&format!("{}/old", server.uri())).await.unwrap();
        assert_eq!(page.final_url.path(), "/new");
        assert_eq!(page.url.path(), "/old");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = client().fetch("not a url").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let result = client().fetch("http://127.0.0.1:1/").await;
        assert!(matches!(result, Err(Error::FetchTransport(_))));
    }
}
