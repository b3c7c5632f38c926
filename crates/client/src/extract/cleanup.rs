//! Post-extraction cleanup applied to every metadata record.

use ogmeta_core::PageMetadata;

use crate::fetch::is_absolute_url;

/// Maximum title length in characters, ellipsis included.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum description length in characters, ellipsis included.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

const ELLIPSIS: &str = "...";

/// Normalize extracted fields.
///
/// - Control characters other than `\n` and `\t` are removed
/// - Surrounding whitespace is trimmed
/// - Title and description are truncated with a trailing `...`
/// - `image` is cleared unless it is an absolute URL with scheme and host
pub fn cleanup_metadata(page: PageMetadata) -> PageMetadata {
    let image = clean_text(&page.image);
    PageMetadata {
        title: truncate_chars(&clean_text(&page.title), MAX_TITLE_CHARS),
        description: truncate_chars(&clean_text(&page.description), MAX_DESCRIPTION_CHARS),
        image: if is_absolute_url(&image) { image } else { String::new() },
        site_name: clean_text(&page.site_name),
    }
}

/// Strip control characters and trim.
pub fn clean_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// True when the head of a document is mostly non-text.
///
/// Looks at the first 1024 characters and fails the document when more than
/// 10% of them are control characters that are not whitespace.
pub fn looks_binary(text: &str) -> bool {
    let mut total = 0usize;
    let mut control = 0usize;
    for c in text.chars().take(1024) {
        total += 1;
        if c.is_control() && !c.is_whitespace() {
            control += 1;
        }
    }
    control * 10 > total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str, description: &str, image: &str, site_name: &str) -> PageMetadata {
        PageMetadata {
            title: title.to_string(),
            description: description.to_string(),
            image: image.to_string(),
            site_name: site_name.to_string(),
        }
    }

    #[test]
    fn test_trim_and_strip_controls() {
        let cleaned = cleanup_metadata(page("  Hello\0 World\u{7}  ", "\tline one\nline two\r\n", "", " Site "));
        assert_eq!(cleaned.title, "Hello World");
        assert_eq!(cleaned.description, "line one\nline two");
        assert_eq!(cleaned.site_name, "Site");
    }

    #[test]
    fn test_inner_tabs_and_newlines_kept() {
        assert_eq!(clean_text("a\tb\nc"), "a\tb\nc");
    }

    #[test]
    fn test_title_truncated_to_200() {
        let cleaned = cleanup_metadata(page(&"t".repeat(250), "", "", ""));
        assert_eq!(cleaned.title.chars().count(), 200);
        assert!(cleaned.title.ends_with("..."));
        assert_eq!(&cleaned.title[..197], "t".repeat(197));
    }

    #[test]
    fn test_title_at_limit_untouched() {
        let title = "t".repeat(200);
        assert_eq!(cleanup_metadata(page(&title, "", "", "")).title, title);
    }

    #[test]
    fn test_description_truncated_to_500() {
        let cleaned = cleanup_metadata(page("", &"d".repeat(600), "", ""));
        assert_eq!(cleaned.description.chars().count(), 500);
        assert!(cleaned.description.ends_with("..."));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let title = "é".repeat(201);
        let cleaned = truncate_chars(&title, MAX_TITLE_CHARS);
        assert_eq!(cleaned.chars().count(), 200);
        assert!(cleaned.starts_with(&"é".repeat(197)));
    }

    #[test]
    fn test_relative_image_cleared() {
        assert_eq!(cleanup_metadata(page("", "", "/img/cover.png", "")).image, "");
        assert_eq!(cleanup_metadata(page("", "", "cover.png", "")).image, "");
        assert_eq!(cleanup_metadata(page("", "", "javascript:alert(1)", "")).image, "");
    }

    #[test]
    fn test_absolute_image_kept() {
        let cleaned = cleanup_metadata(page("", "", " https://cdn.example.com/a.png ", ""));
        assert_eq!(cleaned.image, "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_looks_binary() {
        assert!(!looks_binary("<html><head><title>ok</title></head></html>"));
        assert!(!looks_binary(""));
        assert!(!looks_binary("line\n\tindented\r\n"));
        assert!(looks_binary("\u{1}\u{2}\u{3}\u{4}PNG\u{0}\u{0}\u{0}\rIHDR"));
    }

    #[test]
    fn test_looks_binary_threshold() {
        let mostly_text = format!("{}{}", "a".repeat(95), "\u{1}".repeat(5));
        assert!(!looks_binary(&mostly_text));
        let too_many = format!("{}{}", "a".repeat(85), "\u{1}".repeat(15));
        assert!(looks_binary(&too_many));
    }
}
