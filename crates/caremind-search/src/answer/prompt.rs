//! Prompt rendering for a downstream model.
//!
//! Nothing here calls a model. The rendered pair is printed by
//! `caremind ask --print-prompt` and returned in JSON output so it can be fed
//! to whatever model the operator runs.

use caremind_core::hit::find_year;
use caremind_core::{Hit, HitMeta};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// System prompt.
pub const SYSTEM: &str = "你是一名临床药师/循证护理专家。请仅依据“检索到的指南/共识片段”和“药品表数据”作答。
必须：
- 先给出简洁要点清单（最多5条）
- 每条后标注[来源: 文献/机构, 年份/版本]
- 如信息不足，明确说明“依据不足，建议查阅最新指南/与上级医师确认”
- 结尾追加合规声明：“仅供临床决策参考，不替代医师诊断与处方。”
";

/// User message template. Placeholders: `{question}`, `{k}`,
/// `{guideline_snippets}`, `{drug_info}`.
pub const USER_TEMPLATE: &str = "【临床问题】
{question}

【检索到的指南/共识片段（Top-{k}）】
{guideline_snippets}

【药品结构化信息】
{drug_info}
";

/// Maximum characters of one snippet in the prompt.
pub const SNIPPET_CHARS: usize = 1200;

const NO_SNIPPETS: &str = "未检索到相关指南片段。";
const UNKNOWN_SOURCE: &str = "未知来源";
const UNKNOWN_YEAR: &str = "未知年份";
const NO_DRUG: &str = "未指定药品";
const EMPTY_DRUG: &str = "（药品信息存在，但字段为空）";

/// Keys tried, in order, when a hit has no `source`.
const SOURCE_KEYS: [&str; 10] = [
    "org",
    "organization",
    "issuer",
    "journal_name",
    "journal",
    "publisher",
    "collection",
    "website",
    "book_title",
    "conference",
];

/// Keys tried, in order, when a hit has no parsed `year`.
const YEAR_KEYS: [&str; 4] = ["year", "pub_year", "publish_date", "date"];

/// Drug fields rendered in the prompt with their labels.
const DRUG_LABELS: [(&str, &str); 7] = [
    ("name", "药品名称"),
    ("indications", "适应症"),
    ("contraindications", "禁忌症"),
    ("interactions", "药物相互作用"),
    ("dosage", "用法用量"),
    ("pregnancy_category", "妊娠分级"),
    ("source", "来源"),
];

/// A rendered system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Render the prompt pair for a question, its guideline hits and an optional
/// drug hit.
#[must_use]
pub fn render_prompt(question: &str, k: usize, hits: &[Hit], drug: Option<&Hit>) -> Prompt {
    let k = k.to_string();
    let snippets = format_guideline_snippets(hits);
    let drug_info = format_drug_info(drug);
    let user = fill_template(
        USER_TEMPLATE,
        &[
            ("question", question.trim()),
            ("k", &k),
            ("guideline_snippets", &snippets),
            ("drug_info", &drug_info),
        ],
    );
    Prompt {
        system: SYSTEM.to_string(),
        user,
    }
}

/// Substitute `{name}` placeholders in one pass. Unknown placeholders and
/// braces inside substituted values are left alone.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render guideline hits as `【title | source | year】` blocks.
///
/// Source and year are inferred from alternative metadata keys when the
/// typed fields are missing. Entries with the same title, source, year and
/// page are shown once.
#[must_use]
pub fn format_guideline_snippets(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return NO_SNIPPETS.to_string();
    }

    let mut seen = HashSet::new();
    let mut blocks = Vec::new();
    for hit in hits {
        let meta = &hit.meta;
        let source = infer_source(meta);
        let year = infer_year(meta);
        let title = meta
            .title
            .clone()
            .or_else(|| file_stem(meta))
            .unwrap_or_default();
        let page = meta.extra_text("page").or_else(|| meta.extra_text("pages"));

        if !seen.insert((title.clone(), source.clone(), year.clone(), page)) {
            continue;
        }

        let content: String = hit.content.trim().chars().take(SNIPPET_CHARS).collect();
        let title_part = if title.is_empty() {
            String::new()
        } else {
            format!("{title} | ")
        };
        blocks.push(format!("【{title_part}{source} | {year}】\n{content}"));
    }
    blocks.join("\n\n")
}

/// Render a drug hit's fields with Chinese labels.
#[must_use]
pub fn format_drug_info(drug: Option<&Hit>) -> String {
    let Some(drug) = drug else {
        return NO_DRUG.to_string();
    };

    let lines: Vec<String> = DRUG_LABELS
        .iter()
        .filter_map(|(field, label)| {
            let value = match *field {
                "name" => drug.meta.title.clone(),
                "source" => drug.meta.source_name.clone(),
                other => drug.meta.extra_text(other),
            };
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect();

    if lines.is_empty() {
        EMPTY_DRUG.to_string()
    } else {
        lines.join("\n")
    }
}

fn infer_source(meta: &HitMeta) -> String {
    meta.source_name
        .clone()
        .or_else(|| SOURCE_KEYS.iter().find_map(|key| meta.extra_text(key)))
        .or_else(|| file_stem(meta))
        .or_else(|| meta.title.clone())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

fn infer_year(meta: &HitMeta) -> String {
    if let Some(year) = meta.year {
        return year.to_string();
    }
    // Only the first present date-like key is consulted.
    let dated = YEAR_KEYS
        .iter()
        .find_map(|key| meta.extra_text(key))
        .and_then(|raw| find_year(&raw));
    if let Some(year) = dated {
        return year.to_string();
    }
    meta.title
        .as_deref()
        .and_then(find_year)
        .or_else(|| {
            ["source_filename", "file"]
                .iter()
                .find_map(|key| meta.extra_text(key).as_deref().and_then(find_year))
        })
        .map_or_else(|| UNKNOWN_YEAR.to_string(), |year| year.to_string())
}

fn file_stem(meta: &HitMeta) -> Option<String> {
    let path = meta
        .extra_text("source_filename")
        .or_else(|| meta.extra_text("file"))?;
    Path::new(&path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::{HitSource, MetaValue};
    use std::collections::BTreeMap;

    fn guideline(content: &str, meta: HitMeta) -> Hit {
        Hit::new("g", content, meta, 0.9, HitSource::Guideline)
    }

    fn extra(pairs: &[(&str, &str)]) -> BTreeMap<String, MetaValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), MetaValue::from(*v)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Snippets
    // -----------------------------------------------------------------------

    #[test]
    fn empty_hits_render_placeholder() {
        assert_eq!(format_guideline_snippets(&[]), "未检索到相关指南片段。");
    }

    #[test]
    fn typed_fields_render_directly() {
        let meta = HitMeta {
            title: Some("高血压指南".into()),
            source_name: Some("中华医学会".into()),
            year: Some(2018),
            ..HitMeta::default()
        };
        let block = format_guideline_snippets(&[guideline("  降压目标 <140/90  ", meta)]);
        assert_eq!(block, "【高血压指南 | 中华医学会 | 2018】\n降压目标 <140/90");
    }

    #[test]
    fn source_and_year_fall_back_to_alternative_keys() {
        let meta = HitMeta {
            extra: extra(&[
                ("journal_name", "中华心血管病杂志"),
                ("publish_date", "2021-05-01"),
            ]),
            ..HitMeta::default()
        };
        let block = format_guideline_snippets(&[guideline("x", meta)]);
        assert_eq!(block, "【中华心血管病杂志 | 2021】\nx");
    }

    #[test]
    fn file_stem_supplies_title_and_source() {
        let meta = HitMeta {
            extra: extra(&[("source_filename", "docs/糖尿病防治指南2020.pdf")]),
            ..HitMeta::default()
        };
        let block = format_guideline_snippets(&[guideline("x", meta)]);
        assert_eq!(block, "【糖尿病防治指南2020 | 糖尿病防治指南2020 | 2020】\nx");
    }

    #[test]
    fn unknowns_are_labelled() {
        let block = format_guideline_snippets(&[guideline("x", HitMeta::default())]);
        assert_eq!(block, "【未知来源 | 未知年份】\nx");
    }

    #[test]
    fn duplicates_by_title_source_year_page_are_dropped() {
        let meta = HitMeta {
            title: Some("T".into()),
            source_name: Some("S".into()),
            year: Some(2020),
            extra: extra(&[("page", "3")]),
        };
        let mut other_page = meta.clone();
        other_page.extra = extra(&[("page", "4")]);

        let hits = [
            guideline("first", meta.clone()),
            guideline("second", meta),
            guideline("third", other_page),
        ];
        let block = format_guideline_snippets(&hits);
        assert!(block.contains("first"));
        assert!(!block.contains("second"));
        assert!(block.contains("third"));
    }

    #[test]
    fn content_is_truncated() {
        let long = "字".repeat(SNIPPET_CHARS + 50);
        let block = format_guideline_snippets(&[guideline(&long, HitMeta::default())]);
        let body = block.split('\n').nth(1).expect("body line");
        assert_eq!(body.chars().count(), SNIPPET_CHARS);
    }

    // -----------------------------------------------------------------------
    // Drug info
    // -----------------------------------------------------------------------

    #[test]
    fn drug_block_renders_known_fields_in_order() {
        let meta = HitMeta {
            title: Some("阿司匹林".into()),
            source_name: Some("说明书".into()),
            year: None,
            extra: extra(&[("contraindications", "消化道溃疡"), ("indications", "抗血小板")]),
        };
        let drug = Hit::new("drug:1", "", meta, 1.0, HitSource::Drug);
        assert_eq!(
            format_drug_info(Some(&drug)),
            "药品名称: 阿司匹林\n适应症: 抗血小板\n禁忌症: 消化道溃疡\n来源: 说明书"
        );
    }

    #[test]
    fn drug_block_placeholders() {
        assert_eq!(format_drug_info(None), "未指定药品");
        let empty = Hit::new("drug:1", "", HitMeta::default(), 1.0, HitSource::Drug);
        assert_eq!(format_drug_info(Some(&empty)), "（药品信息存在，但字段为空）");
    }

    // -----------------------------------------------------------------------
    // Template
    // -----------------------------------------------------------------------

    #[test]
    fn user_prompt_fills_every_placeholder() {
        let prompt = render_prompt("  老年高血压目标？ ", 4, &[], None);
        assert!(prompt.user.starts_with("【临床问题】\n老年高血压目标？\n"));
        assert!(prompt.user.contains("（Top-4）"));
        assert!(prompt.user.contains("未检索到相关指南片段。"));
        assert!(prompt.user.contains("未指定药品"));
        assert!(!prompt.user.contains("{drug_info}"));
        assert_eq!(prompt.system, SYSTEM);
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let filled = fill_template("{a}-{b}-{c}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(filled, "{b}-x-{c}");
    }
}
