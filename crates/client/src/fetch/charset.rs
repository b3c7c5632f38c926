//! Byte-to-text normalization for fetched pages.
//!
//! Detection order follows what browsers do before parsing:
//! byte order mark, then the `charset` parameter of `Content-Type`, then a
//! `<meta charset>` or `http-equiv` declaration in the first 1024 bytes.
//! When nothing is declared the bytes are taken as UTF-8 with invalid
//! sequences replaced, which never fails.

use encoding_rs::Encoding;
use regex::bytes::Regex;
use std::sync::LazyLock;

/// How far into the body the meta prescan looks.
const PRESCAN_BYTES: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).expect("invalid meta charset pattern")
});

/// Where a detected encoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    Bom,
    Header,
    Meta,
}

/// Detect the declared encoding of an HTML body.
pub fn sniff_encoding(bytes: &[u8], content_type: Option<&str>) -> Option<(&'static Encoding, CharsetSource)> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Some((encoding, CharsetSource::Bom));
    }

    if let Some(encoding) = content_type.and_then(header_charset) {
        return Some((encoding, CharsetSource::Header));
    }

    let head = &bytes[..bytes.len().min(PRESCAN_BYTES)];
    META_CHARSET
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        // Meta-declared UTF-16 is read as UTF-8, as browsers do.
        .map(|encoding| (encoding.output_encoding(), CharsetSource::Meta))
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
        })
        .find_map(|label| Encoding::for_label(label.as_bytes()))
}

/// Decode an HTML body to a string.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    match sniff_encoding(bytes, content_type) {
        Some((encoding, source)) => {
            let (text, actual, had_errors) = encoding.decode(bytes);
            tracing::trace!(encoding = actual.name(), ?source, had_errors, "decoded page body");
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
