//! Candidate collection from parsed JSON-LD nodes.
//!
//! Values are viewed through [`Shape`] and walked depth-first with a depth
//! bound and a visited set keyed on object identity.

use std::collections::HashSet;

use serde_json::{Map, Value};

const MAX_DEPTH: usize = 24;

const IMAGE_OBJECT_FIELDS: &[&str] = &["url", "@id", "contentUrl", "thumbnailUrl"];
const TEXT_OBJECT_FIELDS: &[&str] = &["text", "value", "@value"];

/// Keys whose subtrees describe people or organisations rather than the page,
/// so their `name` fields are never title candidates.
const PARTY_KEYS: &[&str] = &["author", "creator", "publisher", "contributor", "editor"];

type Object = Map<String, Value>;

enum Shape<'a> {
    Text(&'a str),
    List(&'a [Value]),
    Object(&'a Object),
    Other,
}

impl<'a> From<&'a Value> for Shape<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Shape::Text(s),
            Value::Array(items) => Shape::List(items),
            Value::Object(map) => Shape::Object(map),
            Value::Null | Value::Bool(_) | Value::Number(_) => Shape::Other,
        }
    }
}

/// Image and title candidates found anywhere in a set of nodes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JsonLdCandidates {
    pub images: Vec<String>,
    /// `headline` values first, then `name` values, each in discovery order.
    pub titles: Vec<String>,
}

pub fn collect_candidates(nodes: &[Object]) -> JsonLdCandidates {
    let mut walker = Walker::default();
    for node in nodes {
        walker.visit_object(node, 0);
    }
    let mut titles = walker.headlines;
    titles.extend(walker.names);
    JsonLdCandidates {
        images: dedup(walker.images),
        titles: dedup(titles),
    }
}

/// First non-empty `author` / `creator` on a top-level node.
pub fn find_author(nodes: &[Object]) -> Option<String> {
    top_level(nodes).find_map(|node| {
        ["author", "creator"]
            .iter()
            .filter_map(|key| get_ci(node, key))
            .find_map(|value| party_name(value, 0))
    })
}

/// First non-empty `publisher` on a top-level node.
pub fn find_publisher(nodes: &[Object]) -> Option<String> {
    top_level(nodes).find_map(|node| get_ci(node, "publisher").and_then(|v| party_name(v, 0)))
}

/// Each node plus the members of its `@graph`, if it has one.
fn top_level(nodes: &[Object]) -> impl Iterator<Item = &Object> {
    nodes.iter().flat_map(|node| {
        let graph: &[Value] = match node.get("@graph") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        std::iter::once(node).chain(graph.iter().filter_map(Value::as_object))
    })
}

fn party_name(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    match Shape::from(value) {
        Shape::Text(s) => non_empty(s),
        Shape::List(items) => items.iter().find_map(|v| party_name(v, depth + 1)),
        Shape::Object(map) => ["name", "text", "value", "@value"]
            .iter()
            .filter_map(|key| get_ci(map, key))
            .find_map(|v| party_name(v, depth + 1)),
        Shape::Other => None,
    }
}

#[derive(Default)]
struct Walker {
    visited: HashSet<usize>,
    images: Vec<String>,
    headlines: Vec<String>,
    names: Vec<String>,
}

impl Walker {
    fn visit(&mut self, value: &Value, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        match Shape::from(value) {
            Shape::List(items) => {
                for item in items {
                    self.visit(item, depth + 1);
                }
            }
            Shape::Object(map) => self.visit_object(map, depth),
            Shape::Text(_) | Shape::Other => {}
        }
    }

    fn visit_object(&mut self, map: &Object, depth: usize) {
        if depth > MAX_DEPTH || !self.visited.insert(identity(map)) {
            return;
        }
        for (key, value) in map {
            let key = key.to_ascii_lowercase();
            match key.as_str() {
                "image" | "thumbnailurl" => self.image_value(value, depth + 1),
                "headline" => push_text(&mut self.headlines, value, depth + 1),
                "name" => push_text(&mut self.names, value, depth + 1),
                k if PARTY_KEYS.contains(&k) => {}
                _ => self.visit(value, depth + 1),
            }
        }
    }

    fn image_value(&mut self, value: &Value, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        match Shape::from(value) {
            Shape::Text(s) => {
                if let Some(s) = non_empty(s) {
                    self.images.push(s);
                }
            }
            Shape::List(items) => {
                for item in items {
                    self.image_value(item, depth + 1);
                }
            }
            Shape::Object(map) => {
                let direct = IMAGE_OBJECT_FIELDS
                    .iter()
                    .filter_map(|field| {
                        let value = get_ci(map, field).and_then(Value::as_str)?;
                        // `@id` values like ".../#primaryimage" are graph references, not images.
                        (*field != "@id" || !value.contains('#')).then_some(value)
                    })
                    .find_map(non_empty);
                if let Some(url) = direct {
                    self.images.push(url);
                }
                self.visit_object(map, depth);
            }
            Shape::Other => {}
        }
    }
}

fn push_text(out: &mut Vec<String>, value: &Value, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    match Shape::from(value) {
        Shape::Text(s) => {
            if let Some(s) = non_empty(s) {
                out.push(s);
            }
        }
        Shape::List(items) => {
            for item in items {
                push_text(out, item, depth + 1);
            }
        }
        Shape::Object(map) => {
            if let Some(s) = TEXT_OBJECT_FIELDS
                .iter()
                .filter_map(|field| get_ci(map, field).and_then(Value::as_str))
                .find_map(non_empty)
            {
                out.push(s);
            }
        }
        Shape::Other => {}
    }
}

fn identity(map: &Object) -> usize {
    std::ptr::from_ref(map) as usize
}

fn get_ci<'a>(map: &'a Object, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nodes(values: Vec<Value>) -> Vec<Object> {
        values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn collects_images_in_every_shape() {
        let nodes = nodes(vec![json!({
            "@type": "Article",
            "image": ["https://a.test/1.jpg", {"@type": "ImageObject", "url": "https://a.test/2.jpg"}],
            "video": {"thumbnailUrl": "https://a.test/thumb.jpg"},
            "mainEntity": {"image": {"contentUrl": "https://a.test/3.jpg"}}
        })]);
        let found = collect_candidates(&nodes);
        assert_eq!(
            found.images,
            vec![
                "https://a.test/1.jpg",
                "https://a.test/2.jpg",
                "https://a.test/thumb.jpg",
                "https://a.test/3.jpg",
            ]
        );
    }

    #[test]
    fn headline_precedes_name_and_party_names_are_skipped() {
        let nodes = nodes(vec![json!({
            "author": {"@type": "Person", "name": "Jane Doe"},
            "name": "Article Name",
            "publisher": {"name": "Example News"},
            "headline": "The Headline"
        })]);
        let found = collect_candidates(&nodes);
        assert_eq!(found.titles, vec!["The Headline", "Article Name"]);
    }

    #[test]
    fn title_object_form_uses_text_or_value() {
        let nodes = nodes(vec![json!({"headline": {"@value": "Typed Headline"}})]);
        assert_eq!(collect_candidates(&nodes).titles, vec!["Typed Headline"]);
    }

    #[test]
    fn graph_reference_ids_are_not_images() {
        let nodes = nodes(vec![json!({"image": {"@id": "https://a.test/#primaryimage"}})]);
        assert!(collect_candidates(&nodes).images.is_empty());
    }

    #[test]
    fn image_urls_may_carry_fragments() {
        let nodes = nodes(vec![json!({
            "image": {"@type": "ImageObject", "contentUrl": "https://a.test/cover.jpg#crop"}
        })]);
        assert_eq!(
            collect_candidates(&nodes).images,
            vec!["https://a.test/cover.jpg#crop"]
        );
    }

    #[test]
    fn author_and_publisher_from_top_level_only() {
        let nodes = nodes(vec![
            json!({"@type": "WebPage", "mainEntity": {"author": "Nested Person"}}),
            json!({
                "@type": "NewsArticle",
                "author": [{"@type": "Person", "name": "  "}, {"@type": "Person", "name": "Ana"}],
                "publisher": {"@type": "Organization", "name": "Daily"}
            }),
        ]);
        assert_eq!(find_author(&nodes).as_deref(), Some("Ana"));
        assert_eq!(find_publisher(&nodes).as_deref(), Some("Daily"));
    }

    #[test]
    fn graph_members_count_as_top_level() {
        let nodes = nodes(vec![json!({
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebSite", "name": "Site"},
                {"@type": "Article", "headline": "In Graph", "creator": "Graph Author"}
            ]
        })]);
        assert_eq!(find_author(&nodes).as_deref(), Some("Graph Author"));
        assert_eq!(collect_candidates(&nodes).titles, vec!["In Graph", "Site"]);
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut value = json!({"headline": "too deep"});
        for _ in 0..200 {
            value = json!({ "child": value });
        }
        let nodes = nodes(vec![value]);
        assert!(collect_candidates(&nodes).titles.is_empty());
    }

    #[test]
    fn duplicates_are_collapsed() {
        let nodes = nodes(vec![
            json!({"image": "https://a.test/x.jpg"}),
            json!({"thumbnailUrl": "https://a.test/x.jpg"}),
        ]);
        assert_eq!(collect_candidates(&nodes).images, vec!["https://a.test/x.jpg"]);
    }
}
