//! Evidence filtering and markdown export.

use super::i18n::{Lang, Msg, text};
use caremind_core::Hit;
use serde::Serialize;
use std::fmt::Write as _;

/// Client-side filter over retrieved hits.
///
/// A source filter matches case-insensitive substrings of `meta.source`.
/// The year range is inclusive; hits without a year always pass it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceFilter {
    pub source_contains: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

impl EvidenceFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_needle().is_none() && self.year_min.is_none() && self.year_max.is_none()
    }

    fn source_needle(&self) -> Option<String> {
        self.source_contains
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    #[must_use]
    pub fn matches(&self, hit: &Hit) -> bool {
        let source_ok = self.source_needle().is_none_or(|needle| {
            hit.meta
                .source_name
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
        });

        let year_ok = hit.meta.year.is_none_or(|year| {
            self.year_min.is_none_or(|min| year >= min) && self.year_max.is_none_or(|max| year <= max)
        });

        source_ok && year_ok
    }

    /// Hits that pass, in their original order.
    #[must_use]
    pub fn apply(&self, hits: &[Hit]) -> Vec<Hit> {
        hits.iter().filter(|hit| self.matches(hit)).cloned().collect()
    }
}

/// How many hits each source contributed, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub hits: usize,
}

/// Tally hits per source. Hits without a source count under a localized
/// "unknown" label.
#[must_use]
pub fn source_counts(hits: &[Hit], lang: Lang) -> Vec<SourceCount> {
    let mut counts: Vec<SourceCount> = Vec::new();
    for hit in hits {
        let source = hit
            .meta
            .source_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| text(lang, Msg::UnknownSource));
        match counts.iter_mut().find(|c| c.source == source) {
            Some(entry) => entry.hits += 1,
            None => counts.push(SourceCount {
                source: source.to_string(),
                hits: 1,
            }),
        }
    }
    counts
}

/// Render hits as a markdown evidence list, one `### #i title` section per
/// hit.
#[must_use]
pub fn evidence_markdown(hits: &[Hit], lang: Lang) -> String {
    let mut sections = Vec::with_capacity(hits.len());
    for (idx, hit) in hits.iter().enumerate() {
        let meta = &hit.meta;
        let title = meta
            .title
            .as_deref()
            .unwrap_or_else(|| text(lang, Msg::Untitled));
        let source = meta
            .source_name
            .as_deref()
            .unwrap_or_else(|| text(lang, Msg::UnknownSource));
        let year = meta.year.map_or_else(|| "—".to_string(), |y| y.to_string());

        let mut section = String::new();
        let _ = writeln!(section, "### #{} {title}", idx + 1);
        let _ = writeln!(section);
        let _ = writeln!(
            section,
            "- {}{source} · {}{year}",
            text(lang, Msg::SourceLabel),
            text(lang, Msg::YearLabel)
        );
        let _ = writeln!(section);
        let _ = writeln!(section, "{}", hit.content);
        sections.push(section);
    }
    sections.join("\n")
}

/// Turn `[#3]` / `[3]` citation markers into `[3](#hit-3)` anchors.
#[must_use]
pub fn link_citations(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let body = after.strip_prefix('#').unwrap_or(after);
        let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && body[digits..].starts_with(']') {
            let number = &body[..digits];
            let _ = write!(out, "[{number}](#hit-{number})");
            rest = &body[digits + 1..];
        } else {
            out.push('[');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
