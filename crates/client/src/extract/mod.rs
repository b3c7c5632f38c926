//! OpenGraph metadata extraction.
//!
//! ### Parsing
//! - `scraper` (html5ever) builds a tree from any input; unclosed tags and
//!   invalid nesting are repaired rather than rejected.
//! - Only input that is not text at all is refused (`PARSE_ERROR`).
//!
//! ### Fallback Chains
//! One pre-order pass over the tree records the first non-empty candidate per
//! field and per tier; the highest tier with a candidate wins. The walk is
//! iterative, so nesting depth never grows the stack.
//!
//! | field         | tier 0              | tier 1                                         | tier 2                  |
//! |---------------|---------------------|------------------------------------------------|-------------------------|
//! | `title`       | `og:title`          | `twitter:title`                                | `<title>`               |
//! | `description` | `og:description`    | `description` / `twitter:description`          | first `<p>` > 20 chars  |
//! | `image`       | `og:image`          | `twitter:image`                                |                         |
//! | `site_name`   | `og:site_name`      | page host                                      |                         |
//!
//! ### Cleanup
//! - See [`cleanup_metadata`].

pub mod cleanup;

pub use cleanup::{cleanup_metadata, looks_binary, truncate_chars};

use ogmeta_core::{Error, PageMetadata};
use scraper::{ElementRef, Html};
use url::Url;

/// Minimum trimmed length, in characters, of a paragraph used as description.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Stable extractor trait so the coordinator is not tied to one parser.
pub trait Extractor: Send + Sync {
    /// Extract cleaned metadata from a decoded HTML document.
    fn extract(&self, html: &str, page_url: &Url) -> Result<PageMetadata, Error>;
}

/// Meta-tag extractor with OpenGraph, Twitter card and document fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGraphExtractor;

impl OpenGraphExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for OpenGraphExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<PageMetadata, Error> {
        if looks_binary(html) {
            return Err(Error::Parse("document is not text".to_string()));
        }

        let document = Html::parse_document(html);
        let mut candidates = Candidates::default();
        for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
            visit(element, &mut candidates);
        }

        if candidates.site_name[1].is_none() {
            candidates.site_name[1] = host_with_port(page_url);
        }

        let page = cleanup_metadata(candidates.resolve());
        tracing::debug!(
            url = %page_url,
            title = %page.title,
            has_description = !page.description.is_empty(),
            has_image = !page.image.is_empty(),
            "extracted metadata"
        );
        Ok(page)
    }
}

/// Extract metadata using the default extractor.
pub fn extract_metadata(html: &str, page_url: &Url) -> Result<PageMetadata, Error> {
    OpenGraphExtractor::new().extract(html, page_url)
}

/// First non-empty value seen for each field, per tier.
#[derive(Debug, Default)]
struct Candidates {
    title: [Option<String>; 3],
    description: [Option<String>; 3],
    image: [Option<String>; 2],
    site_name: [Option<String>; 2],
}

impl Candidates {
    fn resolve(self) -> PageMetadata {
        PageMetadata {
            title: best(self.title),
            description: best(self.description),
            image: best(self.image),
            site_name: best(self.site_name),
        }
    }
}

fn best<const N: usize>(tiers: [Option<String>; N]) -> String {
    tiers.into_iter().flatten().next().unwrap_or_default()
}

fn offer(slot: &mut Option<String>, value: &str) {
    if slot.is_some() {
        return;
    }
    let value = value.trim();
    if !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

fn visit(element: ElementRef<'_>, candidates: &mut Candidates) {
    match element.value().name() {
        "meta" => visit_meta(element, candidates),
        "title" => offer(&mut candidates.title[2], &element.text().collect::<String>()),
        "p" if candidates.description[2].is_none() => {
            let text = element.text().collect::<String>();
            if text.trim().chars().count() > MIN_PARAGRAPH_CHARS {
                offer(&mut candidates.description[2], &text);
            }
        }
        _ => {}
    }
}

fn visit_meta(element: ElementRef<'_>, candidates: &mut Candidates) {
    let meta = element.value();
    let Some(content) = meta.attr("content") else {
        return;
    };

    if let Some(property) = meta.attr("property") {
        match property.trim() {
            "og:title" => offer(&mut candidates.title[0], content),
            "og:description" => offer(&mut candidates.description[0], content),
            "og:image" => offer(&mut candidates.image[0], content),
            "og:site_name" => offer(&mut candidates.site_name[0], content),
            _ => {}
        }
    }

    if let Some(name) = meta.attr("name") {
        match name.trim() {
            "twitter:title" => offer(&mut candidates.title[1], content),
            "description" | "twitter:description" => offer(&mut candidates.description[1], content),
            "twitter:image" => offer(&mut candidates.image[1], content),
            _ => {}
        }
    }
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
