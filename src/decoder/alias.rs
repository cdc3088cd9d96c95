//! Legend templates.
//!
//! A template mixes literal text with placeholders in two equivalent
//! spellings, `[[name]]` and `$name`. A name that is a number selects a
//! segment of the dotted series name; `tag_<key>` selects a tag value.
//! Placeholders that resolve to nothing are kept verbatim.

use std::collections::BTreeMap;
use std::fmt::Write;

const TAG_PREFIX: &str = "tag_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part<'a> {
    Text(&'a str),
    /// `raw` is the placeholder as written, `name` is the part inside
    Placeholder { raw: &'a str, name: &'a str },
}

/// A parsed legend template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> Template<'a> {
    pub fn parse(template: &'a str) -> Self {
        let bytes = template.as_bytes();
        let mut parts = Vec::new();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            let placeholder = if bytes[i..].starts_with(b"[[") {
                let end = word_end(bytes, i + 2);
                (end > i + 2 && bytes[end..].starts_with(b"]]")).then(|| (i + 2, end, end + 2))
            } else if bytes[i] == b'$' {
                let end = word_end(bytes, i + 1);
                (end > i + 1).then(|| (i + 1, end, end))
            } else {
                None
            };

            match placeholder {
                Some((name_start, name_end, next)) => {
                    if text_start < i {
                        parts.push(Part::Text(&template[text_start..i]));
                    }
                    parts.push(Part::Placeholder {
                        raw: &template[i..next],
                        name: &template[name_start..name_end],
                    });
                    i = next;
                    text_start = next;
                }
                None => i += 1,
            }
        }

        if text_start < bytes.len() {
            parts.push(Part::Text(&template[text_start..]));
        }

        Self { parts }
    }

    pub fn render(&self, raw_name: &str, tags: &BTreeMap<String, String>) -> String {
        let segments: Vec<&str> = raw_name.split('.').collect();
        let mut out = String::new();

        for part in &self.parts {
            match *part {
                Part::Text(text) => out.push_str(text),
                Part::Placeholder { raw, name } => {
                    out.push_str(resolve(name, &segments, tags).unwrap_or(raw))
                }
            }
        }

        out
    }
}

fn word_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

fn resolve<'t>(name: &str, segments: &[&'t str], tags: &'t BTreeMap<String, String>) -> Option<&'t str> {
    if name.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(segment) = name.parse::<usize>().ok().and_then(|n| segments.get(n)) {
            return Some(*segment);
        }
    }

    let key = name.strip_prefix(TAG_PREFIX)?;
    tags.get(key).map(String::as_str)
}

/// Produce the display name of a series.
///
/// Without a template the name is `key="<raw name>"` followed by every tag
/// in key order.
pub fn format_name(alias: &str, raw_name: &str, tags: &BTreeMap<String, String>) -> String {
    if alias.is_empty() {
        return format_name_from_tags(raw_name, tags);
    }

    Template::parse(alias).render(raw_name, tags)
}

fn format_name_from_tags(raw_name: &str, tags: &BTreeMap<String, String>) -> String {
    let mut out = format!("key=\"{raw_name}\"");
    for (key, value) in tags {
        let _ = write!(out, ", {key}=\"{value}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fallback_lists_tags_in_order() {
        assert_eq!(
            format_name("", "cpu.load", &tags(&[("host", "a")])),
            "key=\"cpu.load\", host=\"a\""
        );
        assert_eq!(
            format_name("", "mem", &tags(&[("site", "lon"), ("host", "b")])),
            "key=\"mem\", host=\"b\", site=\"lon\""
        );
        assert_eq!(format_name("", "mem", &tags(&[])), "key=\"mem\"");
    }

    #[test]
    fn positional_placeholders() {
        let empty = tags(&[]);
        assert_eq!(format_name("$1", "cpu.load", &empty), "load");
        assert_eq!(format_name("[[0]]", "cpu.load", &empty), "cpu");
        assert_eq!(format_name("$0 / [[1]]", "cpu.load", &empty), "cpu / load");
        assert_eq!(format_name("$2", "cpu.load", &empty), "$2");
        assert_eq!(format_name("[[7]]", "cpu", &empty), "[[7]]");
    }

    #[test]
    fn tag_placeholders() {
        let host = tags(&[("host", "a")]);
        assert_eq!(format_name("[[tag_host]]", "x", &host), "a");
        assert_eq!(format_name("$tag_host:$0", "x", &host), "a:x");
        assert_eq!(format_name("[[tag_missing]]", "x", &tags(&[])), "[[tag_missing]]");
        assert_eq!(format_name("$tag_missing", "x", &host), "$tag_missing");
    }

    #[test]
    fn unknown_and_malformed_placeholders_stay_literal() {
        let host = tags(&[("host", "a")]);
        assert_eq!(format_name("$foo", "x", &host), "$foo");
        assert_eq!(format_name("[[host]]", "x", &host), "[[host]]");
        assert_eq!(format_name("cost $ [[ ]] [[0", "x", &host), "cost $ [[ ]] [[0");
        assert_eq!(format_name("100$", "x", &host), "100$");
    }

    #[test]
    fn substitution_does_not_recurse() {
        let tricky = tags(&[("a", "$tag_b"), ("b", "boom")]);
        assert_eq!(format_name("$tag_a", "x", &tricky), "$tag_b");
        assert_eq!(format_name("[[0]]", "$tag_b.y", &tricky), "$tag_b");
    }

    #[test]
    fn parse_splits_text_and_placeholders() {
        assert_eq!(
            Template::parse("cpu [[1]] on $tag_host").parts,
            vec![
                Part::Text("cpu "),
                Part::Placeholder {
                    raw: "[[1]]",
                    name: "1"
                },
                Part::Text(" on "),
                Part::Placeholder {
                    raw: "$tag_host",
                    name: "tag_host"
                },
            ]
        );
    }

    #[test]
    fn non_ascii_text_survives() {
        assert_eq!(format_name("→ $1 ✓", "a.b", &tags(&[])), "→ b ✓");
    }
}
