//! Provider factory.
//!
//! Chooses, once at startup, between the SQLite providers and the demo
//! stand-ins. A store that cannot be opened is an error unless demo mode is
//! on, in which case the stand-in takes its place and a warning is logged.
//! In demo mode a guideline store with no indexed chunks counts as missing.

use crate::answer::{AnswerPipeline, DegradePolicy};
use crate::fusion::HybridRetriever;
use crate::provider::{
    DemoDrugProvider, DemoGuidelineProvider, RelationalSearchProvider, VectorSearchProvider,
};
use crate::relational::SqliteDrugProvider;
use crate::semantic::SqliteGuidelineProvider;
use anyhow::{Context, Result, bail};
use caremind_core::Settings;
use tracing::warn;

/// The two providers a query runs against.
pub struct Backends {
    guideline: Box<dyn VectorSearchProvider>,
    drug: Box<dyn RelationalSearchProvider>,
    stand_ins: Vec<&'static str>,
    max_k: usize,
    demo: bool,
}

impl Backends {
    /// Open both stores named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be opened and demo mode is off.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut stand_ins = Vec::new();

        let opened = SqliteGuidelineProvider::open(
            &settings.guideline_db,
            settings.embedding_dim,
            settings.collection.clone(),
        )
        .and_then(|provider| {
            if settings.demo && provider.active_collection()?.is_none() {
                bail!("no non-empty guideline collection");
            }
            Ok(provider)
        });

        let guideline: Box<dyn VectorSearchProvider> = match opened {
            Ok(provider) => Box::new(provider),
            Err(err) if settings.demo => {
                warn!("guideline store unavailable, using demo provider: {err:#}");
                stand_ins.push("guideline");
                Box::new(DemoGuidelineProvider)
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("guideline store {}", settings.guideline_db.display())
                });
            }
        };

        let drug: Box<dyn RelationalSearchProvider> = match SqliteDrugProvider::open(&settings.drug_db) {
            Ok(provider) => Box::new(provider),
            Err(err) if settings.demo => {
                warn!("drug store unavailable, using demo provider: {err:#}");
                stand_ins.push("drug");
                Box::new(DemoDrugProvider)
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("drug store {}", settings.drug_db.display()));
            }
        };

        Ok(Self {
            guideline,
            drug,
            stand_ins,
            max_k: settings.retrieval.max_k,
            demo: settings.demo,
        })
    }

    /// Demo stand-ins on both sides, regardless of what is on disk.
    #[must_use]
    pub fn demo(max_k: usize) -> Self {
        Self {
            guideline: Box::new(DemoGuidelineProvider),
            drug: Box::new(DemoDrugProvider),
            stand_ins: vec!["guideline", "drug"],
            max_k: max_k.max(1),
            demo: true,
        }
    }

    /// Wrap already-built providers.
    #[must_use]
    pub fn from_providers(
        guideline: Box<dyn VectorSearchProvider>,
        drug: Box<dyn RelationalSearchProvider>,
        max_k: usize,
    ) -> Self {
        Self {
            guideline,
            drug,
            stand_ins: Vec::new(),
            max_k: max_k.max(1),
            demo: false,
        }
    }

    #[must_use]
    pub fn guideline(&self) -> &dyn VectorSearchProvider {
        self.guideline.as_ref()
    }

    #[must_use]
    pub fn drug(&self) -> &dyn RelationalSearchProvider {
        self.drug.as_ref()
    }

    /// Names of the providers replaced by demo stand-ins.
    #[must_use]
    pub fn stand_ins(&self) -> &[&'static str] {
        &self.stand_ins
    }

    /// Whether the guideline side is a demo stand-in.
    #[must_use]
    pub fn guideline_is_stand_in(&self) -> bool {
        self.stand_ins.contains(&"guideline")
    }

    #[must_use]
    pub fn retriever(&self) -> HybridRetriever<'_> {
        HybridRetriever::new(self.guideline(), self.drug()).with_max_k(self.max_k)
    }

    /// Answer pipeline over these providers. `Degrade` unless `strict`, or
    /// demo mode is off.
    #[must_use]
    pub fn pipeline(&self, strict: bool) -> AnswerPipeline<'_> {
        let policy = if strict || !self.demo {
            DegradePolicy::Strict
        } else {
            DegradePolicy::Degrade
        };
        AnswerPipeline::new(self.guideline(), self.drug())
            .with_max_k(self.max_k)
            .with_policy(policy)
            .with_demo_backend(self.guideline_is_stand_in())
    }
}
