//! Forgiving tag scanner. No DOM is built; partial documents are fine.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use url::Url;

// Tag bodies allow quoted `>` so attribute values containing it don't end the tag early.
static META_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).expect("valid regex")
});

static IMG_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).expect("valid regex")
});

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</script\s*>"#)
        .expect("valid regex")
});

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid regex"));

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([^\s"'<>/=]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid regex")
});

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,6});").expect("valid regex")
});

/// `<meta>` key/value pairs in document order. The first occurrence of a key
/// wins; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTags {
    entries: Vec<(String, String)>,
}

impl MetaTags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_first(&mut self, key: String, value: String) {
        if self.get(&key).is_none() {
            self.entries.push((key, value));
        }
    }
}

/// Everything extracted from one fetched document. Owned by the attempt that
/// produced it and dropped once its candidates have been collected.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub raw_html: String,
    /// Final URL after redirects; relative candidates resolve against it.
    pub base_url: Url,
    pub meta_tags: MetaTags,
    pub json_ld_nodes: Vec<Map<String, Value>>,
}

impl DocumentSnapshot {
    pub fn extract(raw_html: String, base_url: Url) -> Self {
        let meta_tags = extract_meta_tags(&raw_html);
        let json_ld_nodes = extract_json_ld(&raw_html);
        DocumentSnapshot {
            raw_html,
            base_url,
            meta_tags,
            json_ld_nodes,
        }
    }

    /// Text of the first `<title>` element.
    pub fn title_element(&self) -> Option<String> {
        TITLE_RE
            .captures(&self.raw_html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str()).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// `src` of the first `<img>` that has one.
    pub fn first_image(&self) -> Option<String> {
        IMG_TAG_RE
            .captures_iter(&self.raw_html)
            .filter_map(|c| c.get(1))
            .find_map(|attrs| attr(attrs.as_str(), "src").filter(|s| !s.is_empty()))
    }
}

pub fn extract_meta_tags(html: &str) -> MetaTags {
    let mut tags = MetaTags::default();
    for caps in META_TAG_RE.captures_iter(html) {
        let Some(attrs) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let attrs = parse_attrs(attrs);
        let lookup = |name: &str| {
            attrs
                .iter()
                .find(|(k, v)| k == name && !v.trim().is_empty())
                .map(|(_, v)| v.trim())
        };

        let Some(key) = lookup("property")
            .or_else(|| lookup("name"))
            .or_else(|| lookup("itemprop"))
        else {
            continue;
        };
        let Some(value) = lookup("content") else {
            continue;
        };
        tags.insert_first(key.to_lowercase(), value.to_string());
    }
    tags
}

/// Parse every `application/ld+json` script block independently. Blocks that
/// are not valid JSON are skipped; top-level arrays are flattened one level.
pub fn extract_json_ld(html: &str) -> Vec<Map<String, Value>> {
    let mut nodes = Vec::new();
    for caps in SCRIPT_RE.captures_iter(html) {
        let is_json_ld = caps
            .get(1)
            .and_then(|attrs| attr(attrs.as_str(), "type"))
            .is_some_and(|t| {
                t.trim()
                    .to_ascii_lowercase()
                    .starts_with("application/ld+json")
            });
        if !is_json_ld {
            continue;
        }

        let raw = caps.get(2).map_or("", |m| m.as_str());
        let raw = strip_comment_wrappers(raw);
        if raw.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => nodes.push(map),
            Ok(Value::Array(items)) => nodes.extend(items.into_iter().filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed JSON-LD block");
            }
        }
    }
    nodes
}

fn strip_comment_wrappers(raw: &str) -> &str {
    let mut raw = raw.trim();
    for (open, close) in [("<!--", "-->"), ("<![CDATA[", "]]>"), ("//<![CDATA[", "//]]>")] {
        if let Some(inner) = raw.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            raw = inner.trim();
        }
    }
    raw
}

/// Attribute pairs with lowercased names and entity-decoded values.
fn parse_attrs(attrs: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(attrs)
        .filter_map(|c| {
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?.as_str();
            Some((name, decode_entities(value).into_owned()))
        })
        .collect()
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    parse_attrs(attrs)
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim().to_string())
}

/// Decode the character references that routinely show up in titles and
/// attribute values. Unknown named references are left untouched.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    ENTITY_RE.replace_all(text, |caps: &Captures| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => None,
            }
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}
