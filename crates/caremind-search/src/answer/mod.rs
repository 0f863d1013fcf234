//! Answer pipeline: retrieve evidence and compose a templated, citation
//! annotated draft.
//!
//! No text is generated by a model. The draft lists the question, the drug
//! and the retrieved evidence as `[#i] title (source, year)` lines, followed
//! by a compliance note. [`prompt`] renders the same evidence as a prompt for
//! an external model.

pub mod filter;
pub mod i18n;
pub mod prompt;

pub use filter::{EvidenceFilter, SourceCount, evidence_markdown, link_citations, source_counts};
pub use i18n::Lang;
pub use prompt::{Prompt, render_prompt};

use crate::fusion::hybrid::DEFAULT_MAX_K;
use crate::provider::{RelationalSearchProvider, VectorSearchProvider, validate_query};
use caremind_core::{Hit, HitMeta, HitSource, RetrievalError};
use i18n::{Msg, text};
use serde::Serialize;
use tracing::{instrument, warn};

/// Id of the placeholder hit returned by the demo fallback.
pub const DEMO_HIT_ID: &str = "demo-0001";

/// What to do when retrieval fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradePolicy {
    /// Answer with the localized demo response.
    #[default]
    Degrade,
    /// Return the error.
    Strict,
}

/// Result of one [`AnswerPipeline::answer`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerBundle {
    /// Markdown draft in the requested language.
    pub output: String,
    pub guideline_hits: Vec<Hit>,
    pub drug: Option<Hit>,
    /// Whether `output` is the demo fallback.
    pub demo: bool,
    /// Clamped `k` the guideline provider was asked for.
    pub k: usize,
    pub lang: Lang,
}

/// Composes answers from a guideline provider and a drug provider.
pub struct AnswerPipeline<'a> {
    guideline: &'a dyn VectorSearchProvider,
    drug: &'a dyn RelationalSearchProvider,
    max_k: usize,
    policy: DegradePolicy,
    demo_backend: bool,
}

impl<'a> AnswerPipeline<'a> {
    #[must_use]
    pub fn new(
        guideline: &'a dyn VectorSearchProvider,
        drug: &'a dyn RelationalSearchProvider,
    ) -> Self {
        Self {
            guideline,
            drug,
            max_k: DEFAULT_MAX_K,
            policy: DegradePolicy::default(),
            demo_backend: false,
        }
    }

    /// Upper bound for `k` (at least 1).
    #[must_use]
    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k.max(1);
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: DegradePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mark the guideline provider as a demo stand-in. With the `Degrade`
    /// policy every answer is then the demo response.
    #[must_use]
    pub const fn with_demo_backend(mut self, demo_backend: bool) -> Self {
        self.demo_backend = demo_backend;
        self
    }

    /// Answer `question`, optionally looking up `drug_name`.
    ///
    /// `k` is clamped into `1..=max_k`. A failing drug lookup is logged and
    /// treated as "no drug"; it never fails the answer.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyQuery`] for a blank question. Under
    /// [`DegradePolicy::Strict`], any guideline retrieval failure.
    #[instrument(skip(self), fields(policy = ?self.policy))]
    pub fn answer(
        &self,
        question: &str,
        drug_name: Option<&str>,
        k: usize,
        lang: Lang,
    ) -> Result<AnswerBundle, RetrievalError> {
        validate_query(question)?;
        let k = k.clamp(1, self.max_k);
        let drug_name = drug_name.map(str::trim).filter(|name| !name.is_empty());
        let degrade = self.policy == DegradePolicy::Degrade;

        if self.demo_backend && degrade {
            return Ok(demo_bundle(question, drug_name, k, lang));
        }

        let guideline_hits = match self.guideline.search(question, k) {
            Ok(hits) => hits,
            Err(err) if degrade && err.is_recoverable() => {
                warn!(code = %err.code(), "guideline retrieval failed, answering in demo mode: {err}");
                return Ok(demo_bundle(question, drug_name, k, lang));
            }
            Err(err) => return Err(err),
        };

        let drug = drug_name.and_then(|name| match self.drug.get_by_name(name) {
            Ok(found) => found,
            Err(err) => {
                warn!(code = %err.code(), drug = name, "drug lookup failed: {err}");
                None
            }
        });

        let output = draft(question, drug_name, &guideline_hits, lang);
        Ok(AnswerBundle {
            output,
            guideline_hits,
            drug,
            demo: false,
            k,
            lang,
        })
    }
}

/// Localized draft listing the question, the drug and the evidence.
#[must_use]
pub fn draft(question: &str, drug_name: Option<&str>, hits: &[Hit], lang: Lang) -> String {
    let mut lines = vec![
        format!("**{}**", text(lang, Msg::HeaderDraft)),
        String::new(),
        format!("- **{}:** {question}", text(lang, Msg::Question)),
    ];
    if let Some(name) = drug_name {
        lines.push(format!("- **{}:** {name}", text(lang, Msg::Drug)));
    }
    lines.push(String::new());
    lines.push(format!("**{}:**", text(lang, Msg::Evidence)));

    if hits.is_empty() {
        lines.push(format!("- {}", text(lang, Msg::NoEvidence)));
    }
    for (idx, hit) in hits.iter().enumerate() {
        let title = hit
            .meta
            .title
            .as_deref()
            .unwrap_or_else(|| text(lang, Msg::Untitled));
        let source = hit
            .meta
            .source_name
            .as_deref()
            .unwrap_or_else(|| text(lang, Msg::UnknownSource));
        let year = hit.meta.year.map_or_else(|| "—".to_string(), |y| y.to_string());
        lines.push(format!("- [#{}] {title} ({source}, {year})", idx + 1));
    }

    lines.push(String::new());
    lines.push(format!("_{}_", text(lang, Msg::Note)));
    lines.join("\n")
}

fn demo_bundle(question: &str, drug_name: Option<&str>, k: usize, lang: Lang) -> AnswerBundle {
    let mut lines = vec![
        format!("**{}**", text(lang, Msg::HeaderDemo)),
        String::new(),
        format!("- **{}:** {question}", text(lang, Msg::Question)),
    ];
    if let Some(name) = drug_name {
        lines.push(format!("- **{}:** {name}", text(lang, Msg::Drug)));
    }
    lines.extend([
        String::new(),
        text(lang, Msg::DemoEnable).to_string(),
        text(lang, Msg::DemoStepGuidelines).to_string(),
        text(lang, Msg::DemoStepDrugs).to_string(),
        text(lang, Msg::DemoStepEnv).to_string(),
        String::new(),
        format!("_{}_", text(lang, Msg::Note)),
    ]);

    let placeholder = Hit::new(
        DEMO_HIT_ID,
        text(lang, Msg::DemoExplain),
        HitMeta {
            title: Some("Demo".to_string()),
            source_name: Some("Demo".to_string()),
            ..HitMeta::default()
        },
        0.0,
        HitSource::Guideline,
    );

    AnswerBundle {
        output: lines.join("\n"),
        guideline_hits: vec![placeholder],
        drug: None,
        demo: true,
        k,
        lang,
    }
}
