//! Title/description/image extraction from fetched HTML

use crate::api::LinkMetadata;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const NO_DESCRIPTION: &str = "No description available";

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid regex"));
static META_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b([^>]*)>").expect("valid regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract link metadata from a page
///
/// Title prefers `<title>` then `og:title`; description prefers
/// `meta[name=description]` then `og:description`; image is `og:image`.
/// Blank values count as missing.
pub fn extract_metadata(html: &str) -> LinkMetadata {
    let metas = meta_tags(html);
    let meta = |attr: &str, key: &str| -> Option<String> {
        metas
            .iter()
            .find(|m| {
                m.get(attr)
                    .is_some_and(|v| v.eq_ignore_ascii_case(key))
            })
            .and_then(|m| m.get("content"))
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
    };

    let title = title_text(html)
        .or_else(|| meta("property", "og:title"))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let description = meta("name", "description")
        .or_else(|| meta("property", "og:description"))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());
    let image = meta("property", "og:image");

    LinkMetadata {
        title,
        description,
        image,
    }
}

fn title_text(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let text = normalize(&TAG_RE.replace_all(raw, ""));
    (!text.is_empty()).then_some(text)
}

/// Attributes of every `<meta>` tag, names lower-cased
fn meta_tags(html: &str) -> Vec<HashMap<String, String>> {
    META_RE
        .captures_iter(html)
        .map(|caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            ATTR_RE
                .captures_iter(attrs)
                .map(|a| {
                    let name = a[1].to_ascii_lowercase();
                    let value = a
                        .get(2)
                        .or_else(|| a.get(3))
                        .or_else(|| a.get(4))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    (name, value.to_string())
                })
                .collect()
        })
        .collect()
}

/// Decode entities and collapse whitespace
fn normalize(text: &str) -> String {
    let decoded = decode_entities(text);
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_description_preferred() {
        let html = r#"<html><head>
            <title> ISO 27001 &amp; You </title>
            <meta property="og:title" content="OG title">
            <meta name="description" content="Plain description">
            <meta property="og:description" content="OG description">
            <meta property="og:image" content="https://example.com/card.png">
        </head></html>"#;

        let meta = extract_metadata(html);
        assert_eq!(meta.title, "ISO 27001 & You");
        assert_eq!(meta.description, "Plain description");
        assert_eq!(meta.image.as_deref(), Some("https://example.com/card.png"));
    }

    #[test]
    fn test_og_fallbacks_and_attribute_order() {
        let html = r#"<head>
            <meta content='Shared title' property='og:title' />
            <META CONTENT="Shared summary" PROPERTY="og:description">
        </head>"#;

        let meta = extract_metadata(html);
        assert_eq!(meta.title, "Shared title");
        assert_eq!(meta.description, "Shared summary");
        assert_eq!(meta.image, None);
    }

    #[test]
    fn test_empty_page_uses_placeholders() {
        let meta = extract_metadata("<html><title>   </title></html>");
        assert_eq!(meta.title, UNKNOWN_TITLE);
        assert_eq!(meta.description, NO_DESCRIPTION);
        assert_eq!(meta.image, None);
    }

    #[test]
    fn test_entity_decoding() {
        assert_eq!(decode_entities("a &lt;b&gt; &#39;c&#x27; &unknown; &"), "a <b> 'c' &unknown; &");
    }
}
