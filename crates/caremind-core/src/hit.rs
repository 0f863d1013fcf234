//! Retrieval result model shared by providers, fusion and the answer pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which store produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Guideline,
    Drug,
}

impl HitSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guideline => "guideline",
            Self::Drug => "drug",
        }
    }
}

impl fmt::Display for HitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar metadata value. Lists and nested objects are flattened to text
/// before they reach this type (see [`MetaValue::from_json`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// Convert an arbitrary JSON value into a scalar.
    ///
    /// Lists whose elements are all scalars become `"a, b, c"`; any other list
    /// or object becomes its JSON text (object keys sorted).
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => {
                if items.iter().all(|item| !item.is_array() && !item.is_object()) {
                    let joined = items
                        .iter()
                        .map(|item| Self::from_json(item).to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Self::Text(joined)
                } else {
                    Self::Text(value.to_string())
                }
            }
            // serde_json's default map is a BTreeMap, so keys serialize sorted.
            Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Non-empty textual form, or `None` for null/blank values.
    #[must_use]
    pub fn as_nonempty_text(&self) -> Option<String> {
        let text = self.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Typed hit metadata with a scalar side channel.
///
/// Serializes flat: `title`, `source` and `year` sit next to the `extra`
/// keys, so exported JSON looks like a plain metadata object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "source", skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<i32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl HitMeta {
    /// Build typed metadata from a sanitized scalar map.
    ///
    /// `title` and `source` move into their typed fields (blank values are
    /// dropped). `year` is parsed from an integer or the first `19xx`/`20xx`
    /// run in text; an unparseable year stays in `extra` untouched.
    #[must_use]
    pub fn from_scalars(mut map: BTreeMap<String, MetaValue>) -> Self {
        let title = take_text(&mut map, "title");
        let source_name = take_text(&mut map, "source");

        let year = match map.get("year").and_then(parse_year) {
            Some(year) => {
                map.remove("year");
                Some(year)
            }
            None => None,
        };

        Self {
            title,
            source_name,
            year,
            extra: map,
        }
    }

    /// Sanitize a JSON object into typed metadata. Non-object input yields
    /// empty metadata.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let map = object
            .iter()
            .map(|(key, value)| (key.clone(), MetaValue::from_json(value)))
            .collect();
        Self::from_scalars(map)
    }

    /// Text of an `extra` entry, ignoring null and blank values.
    #[must_use]
    pub fn extra_text(&self, key: &str) -> Option<String> {
        self.extra.get(key).and_then(MetaValue::as_nonempty_text)
    }
}

fn take_text(map: &mut BTreeMap<String, MetaValue>, key: &str) -> Option<String> {
    map.remove(key)?.as_nonempty_text()
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<MetaValue>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_year))
}

/// Parse a publication year from a metadata value.
#[must_use]
pub fn parse_year(value: &MetaValue) -> Option<i32> {
    match value {
        MetaValue::Int(i) => i32::try_from(*i).ok().filter(|y| (1900..=2099).contains(y)),
        MetaValue::Float(_) | MetaValue::Text(_) => find_year(&value.to_string()),
        MetaValue::Null | MetaValue::Bool(_) => None,
    }
}

/// First `19xx` or `20xx` run of four ASCII digits in `text`.
#[must_use]
pub fn find_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    bytes.windows(4).find_map(|w| {
        let is_year = ((w[0] == b'1' && w[1] == b'9') || (w[0] == b'2' && w[1] == b'0'))
            && w[2].is_ascii_digit()
            && w[3].is_ascii_digit();
        if !is_year {
            return None;
        }
        std::str::from_utf8(w).ok()?.parse().ok()
    })
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
#[must_use]
pub fn unit_interval(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// One retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Identifier, unique within its source. Drug ids are `drug:<row id>`.
    pub id: String,
    pub content: String,
    pub meta: HitMeta,
    /// Similarity in `[0, 1]`, higher is better.
    pub score: f32,
    pub source: HitSource,
}

impl Hit {
    /// Build a hit, clamping `score` into `[0, 1]`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        meta: HitMeta,
        score: f32,
        source: HitSource,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            meta,
            score: unit_interval(score),
            source,
        }
    }

    /// Fusion identity.
    #[must_use]
    pub fn identity(&self) -> (HitSource, &str) {
        (self.source, self.id.as_str())
    }
}

/// A hit plus the score assigned by a fusion strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    #[serde(flatten)]
    pub hit: Hit,
    pub fused_score: f32,
}
