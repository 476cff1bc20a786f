//! Per-field candidate collection and cross-attempt merge.
//!
//! Collection is a pure function of one [`DocumentSnapshot`]; the merge is a
//! pure function of the per-attempt results, so ordering rules can be tested
//! without any I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::models::ResolvedMetadata;
use crate::resolver::jsonld;
use crate::resolver::markup::DocumentSnapshot;

const IMAGE_META_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "og:image:secure-url",
    "twitter:image",
    "twitter:image:src",
    "twitter:image0",
    "image",
    "thumbnailurl",
];

const TITLE_META_KEYS: &[&str] = &["og:title", "twitter:title", "title"];

const SITE_NAME_META_KEYS: &[&str] = &["og:site_name", "site_name", "application-name"];

const AUTHOR_META_KEYWORDS: &[&str] = &[
    "author",
    "authors",
    "article:author",
    "book:author",
    "byline",
    "creator",
    "dc.creator",
    "dc:creator",
    "twitter:creator",
    "作者",
    "著者",
    "筆者",
];

const DESCRIPTION_META_KEYS: &[&str] = &["description", "og:description", "twitter:description"];

static PLACEHOLDER_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(favicon|spacer|pixel|blank|transparent|placeholder|1x1|\.ico$)")
        .expect("valid regex")
});

static AUTHOR_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?i:written\s+by|posted\s+by|by)\s*[:：]?\s+|(?i:authors?|byline)\s*[:：]\s*|(?:作者|著者|筆者|文)\s*[:：]\s*)",
    )
    .expect("valid regex")
});

static INLINE_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:author|written by|作者|著者)\s*[:：]\s*([^|/\n｜／,，。]+)")
        .expect("valid regex")
});

static BODY_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:作者|著者)\s*[:：]\s*([^<|/\n｜／]{1,80})").expect("valid regex")
});

const AUTHOR_SEPARATORS: &[char] = &['|', '/', '\n', '\r', '｜', '／'];

const MAX_AUTHOR_CHARS: usize = 120;

/// How trustworthy a candidate is. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Meta tag or JSON-LD value that passed its filter.
    Structured,
    /// Derived from page content: `<title>`, first `<img>`, inline patterns.
    Document,
    /// Syntactically fine but low-information (favicon, hostname as title).
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub tier: Tier,
}

/// Ordered candidates per field for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCandidates {
    pub image: Vec<Candidate>,
    pub title: Vec<Candidate>,
    pub author: Vec<Candidate>,
    pub site_name: Vec<Candidate>,
}

impl FieldCandidates {
    pub fn from_snapshot(doc: &DocumentSnapshot) -> Self {
        let host = doc.base_url.host_str().unwrap_or_default().to_string();
        let json_ld = jsonld::collect_candidates(&doc.json_ld_nodes);

        FieldCandidates {
            image: image_candidates(doc, &json_ld.images),
            title: title_candidates(doc, &json_ld.titles, &host),
            author: author_candidates(doc),
            site_name: site_name_candidates(doc, &host),
        }
    }

    /// Whether image and title both have a structured candidate. A document
    /// that falls short is worth supplementing with another attempt.
    pub fn is_complete(&self) -> bool {
        has_structured(&self.image) && has_structured(&self.title)
    }
}

fn has_structured(list: &[Candidate]) -> bool {
    list.iter().any(|c| c.tier == Tier::Structured)
}

/// Resolve every field from the candidates of all attempts, in attempt order.
///
/// The lowest tier wins; ties go to the earlier attempt, then to discovery
/// order within that attempt.
pub fn merge(attempts: &[FieldCandidates]) -> ResolvedMetadata {
    ResolvedMetadata {
        image: pick(attempts.iter().map(|a| a.image.as_slice())),
        title: pick(attempts.iter().map(|a| a.title.as_slice())),
        author: pick(attempts.iter().map(|a| a.author.as_slice())),
        site_name: pick(attempts.iter().map(|a| a.site_name.as_slice())),
        error: None,
    }
}

fn pick<'a>(lists: impl Iterator<Item = &'a [Candidate]>) -> Option<String> {
    lists
        .flatten()
        .min_by_key(|c| c.tier)
        .map(|c| c.value.clone())
}

fn push(list: &mut Vec<Candidate>, value: String, tier: Tier) {
    if !list.iter().any(|c| c.value == value) {
        list.push(Candidate { value, tier });
    }
}

// ── Image ──────────────────────────────────────────────────────────────────

fn image_candidates(doc: &DocumentSnapshot, json_ld_images: &[String]) -> Vec<Candidate> {
    let mut out = Vec::new();
    let meta = IMAGE_META_KEYS.iter().filter_map(|key| doc.meta_tags.get(key));
    let structured = meta.chain(json_ld_images.iter().map(String::as_str));

    for raw in structured {
        if let Some(url) = resolve_http_url(&doc.base_url, raw) {
            let tier = if is_placeholder_image(&url) {
                Tier::Placeholder
            } else {
                Tier::Structured
            };
            push(&mut out, url.to_string(), tier);
        }
    }

    if let Some(url) = doc
        .first_image()
        .and_then(|raw| resolve_http_url(&doc.base_url, &raw))
    {
        let tier = if is_placeholder_image(&url) {
            Tier::Placeholder
        } else {
            Tier::Document
        };
        push(&mut out, url.to_string(), tier);
    }
    out
}

/// Resolve `raw` against the document URL, keeping only http(s) results.
pub fn resolve_http_url(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base.join(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

pub fn is_placeholder_image(url: &Url) -> bool {
    if url.scheme() == "data" {
        return true;
    }
    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    PLACEHOLDER_IMAGE_RE.is_match(file_name)
}

// ── Title ──────────────────────────────────────────────────────────────────

fn title_candidates(doc: &DocumentSnapshot, json_ld_titles: &[String], host: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let meta = TITLE_META_KEYS.iter().filter_map(|key| doc.meta_tags.get(key));
    let structured = meta.chain(json_ld_titles.iter().map(String::as_str));

    for raw in structured {
        push_labelled_text(&mut out, raw, host, Tier::Structured);
    }
    if let Some(raw) = doc.title_element() {
        push_labelled_text(&mut out, &raw, host, Tier::Document);
    }
    out
}

/// Normalise whitespace and demote values that merely restate the host.
fn push_labelled_text(out: &mut Vec<Candidate>, raw: &str, host: &str, tier: Tier) {
    let text = normalize_whitespace(raw);
    if text.is_empty() {
        return;
    }
    let tier = if is_host_equivalent(&text, host) {
        Tier::Placeholder
    } else {
        tier
    };
    push(out, text, tier);
}

/// Collapse runs of whitespace (full-width spaces included) to one ASCII space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `true` when `text` is just the page's host, with or without `www.`.
pub fn is_host_equivalent(text: &str, host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    let text = text.trim().to_lowercase();
    let text = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"))
        .unwrap_or(&text);
    let text = text.trim_end_matches('/');
    strip_www(text) == strip_www(&host.to_lowercase())
}

pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

// ── Site name ──────────────────────────────────────────────────────────────

fn site_name_candidates(doc: &DocumentSnapshot, host: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let tags = &doc.meta_tags;

    let exact = SITE_NAME_META_KEYS.iter().filter_map(|key| tags.get(key));
    let app_names = tags
        .iter()
        .filter(|(k, _)| k.starts_with("twitter:app:name:"))
        .map(|(_, v)| v);
    for raw in exact.chain(app_names) {
        push_labelled_text(&mut out, raw, host, Tier::Structured);
    }

    if let Some(publisher) = jsonld::find_publisher(&doc.json_ld_nodes) {
        push_labelled_text(&mut out, &publisher, host, Tier::Structured);
    }

    let loose = tags
        .iter()
        .filter(|(k, _)| {
            (k.contains("site_name") || k.contains("sitename"))
                && !SITE_NAME_META_KEYS.contains(k)
        })
        .map(|(_, v)| v);
    for raw in loose {
        push_labelled_text(&mut out, raw, host, Tier::Document);
    }
    out
}

// ── Author ─────────────────────────────────────────────────────────────────

fn author_candidates(doc: &DocumentSnapshot) -> Vec<Candidate> {
    let mut out = Vec::new();
    let tags = &doc.meta_tags;

    let exact = AUTHOR_META_KEYWORDS.iter().filter_map(|key| tags.get(key));
    let containing = tags
        .iter()
        .filter(|(k, _)| AUTHOR_META_KEYWORDS.iter().any(|kw| k.contains(kw)))
        .map(|(_, v)| v);
    for raw in exact.chain(containing) {
        // `article:author` frequently holds a profile URL rather than a name.
        if raw.starts_with("http://") || raw.starts_with("https://") {
            continue;
        }
        if let Some(author) = clean_author(raw) {
            push(&mut out, author, Tier::Structured);
        }
    }

    if let Some(author) = jsonld::find_author(&doc.json_ld_nodes).and_then(|a| clean_author(&a)) {
        push(&mut out, author, Tier::Structured);
    }

    let inline = DESCRIPTION_META_KEYS
        .iter()
        .filter_map(|key| tags.get(key))
        .filter_map(|desc| INLINE_AUTHOR_RE.captures(desc))
        .filter_map(|c| c.get(1).and_then(|m| clean_author(m.as_str())));
    for author in inline {
        push(&mut out, author, Tier::Document);
    }

    if let Some(author) = BODY_AUTHOR_RE
        .captures(&doc.raw_html)
        .and_then(|c| c.get(1))
        .and_then(|m| clean_author(m.as_str()))
    {
        push(&mut out, author, Tier::Document);
    }
    out
}

/// Strip a leading label ("by ", "作者：") and cut at the first separator.
pub fn clean_author(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unlabelled = AUTHOR_LABEL_RE.replace(trimmed, "");
    let cut = unlabelled
        .split(AUTHOR_SEPARATORS)
        .next()
        .unwrap_or_default();
    let author = normalize_whitespace(cut);
    (!author.is_empty() && author.chars().count() <= MAX_AUTHOR_CHARS).then_some(author)
}
