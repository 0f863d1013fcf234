//! Startup configuration.
//!
//! One [`Settings`] value is built at startup and passed by reference to
//! everything that needs it. Each field resolves as *config file → environment
//! variable → built-in default*; [`Settings::resolve`] takes the environment as
//! a lookup function so resolution stays pure and testable.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_ENV: &str = "CAREMIND_CONFIG";
pub const GUIDELINE_DB_ENV: &str = "CAREMIND_GUIDELINE_DB";
pub const DRUG_DB_ENV: &str = "CAREMIND_SQLITE_PATH";
pub const COLLECTION_ENV: &str = "CAREMIND_COLLECTION";
pub const MAX_K_ENV: &str = "CAREMIND_MAX_K";
pub const EMBEDDING_DIM_ENV: &str = "CAREMIND_EMBEDDING_DIM";
pub const DEMO_ENV: &str = "CAREMIND_DEMO";

const LOCAL_CONFIG_FILE: &str = "caremind.toml";

// ---------------------------------------------------------------------------
// File representation
// ---------------------------------------------------------------------------

/// Contents of `caremind.toml`. Every field is optional so that unset values
/// fall through to the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub demo: Option<bool>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub guideline_db: Option<PathBuf>,
    #[serde(default)]
    pub drug_db: Option<PathBuf>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalSection {
    #[serde(default)]
    pub k_guideline: Option<usize>,
    #[serde(default)]
    pub k_drug: Option<usize>,
    #[serde(default)]
    pub max_k: Option<usize>,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    #[serde(default)]
    pub alpha: Option<f32>,
    #[serde(default)]
    pub k_rrf: Option<f32>,
    #[serde(default)]
    pub topn: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingSection {
    #[serde(default)]
    pub dimension: Option<usize>,
}

/// Which fusion strategy the hybrid retriever uses by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Linear,
    Rrf,
}

impl StrategyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Rrf => "rrf",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "rrf" => Ok(Self::Rrf),
            other => bail!("unknown fusion strategy '{other}' (expected 'linear' or 'rrf')"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalSettings {
    pub k_guideline: usize,
    pub k_drug: usize,
    pub max_k: usize,
    pub strategy: StrategyKind,
    pub alpha: f32,
    pub k_rrf: f32,
    pub topn: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k_guideline: default_k(),
            k_drug: default_k(),
            max_k: default_max_k(),
            strategy: StrategyKind::default(),
            alpha: default_alpha(),
            k_rrf: default_k_rrf(),
            topn: default_topn(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub demo: bool,
    pub output: Option<String>,
    pub guideline_db: PathBuf,
    pub drug_db: PathBuf,
    pub collection: String,
    pub embedding_dim: usize,
    pub retrieval: RetrievalSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            demo: true,
            output: None,
            guideline_db: default_guideline_db(),
            drug_db: default_drug_db(),
            collection: default_collection(),
            embedding_dim: default_embedding_dim(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl Settings {
    /// Locate and parse the config file, then resolve against the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if an
    /// environment override is malformed.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = locate_config_file(cli_path, &env);
        let file = match path.as_deref() {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(&file, env)
    }

    /// Merge file values, environment overrides and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value cannot be parsed or a
    /// resolved value is out of range.
    pub fn resolve<F>(file: &FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_nonempty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let demo = match file.demo {
            Some(flag) => flag,
            None => match env_nonempty(DEMO_ENV) {
                Some(raw) => parse_flag(&raw).with_context(|| format!("parse {DEMO_ENV}"))?,
                None => true,
            },
        };

        let guideline_db = file
            .store
            .guideline_db
            .clone()
            .or_else(|| env_nonempty(GUIDELINE_DB_ENV).map(PathBuf::from))
            .unwrap_or_else(default_guideline_db);
        let drug_db = file
            .store
            .drug_db
            .clone()
            .or_else(|| env_nonempty(DRUG_DB_ENV).map(PathBuf::from))
            .unwrap_or_else(default_drug_db);
        let collection = file
            .store
            .collection
            .clone()
            .or_else(|| env_nonempty(COLLECTION_ENV))
            .unwrap_or_else(default_collection);

        let max_k = match file.retrieval.max_k {
            Some(value) => value,
            None => parse_env(env_nonempty(MAX_K_ENV), MAX_K_ENV)?.unwrap_or_else(default_max_k),
        };
        if max_k == 0 {
            bail!("max_k must be at least 1");
        }

        let embedding_dim = match file.embedding.dimension {
            Some(value) => value,
            None => parse_env(env_nonempty(EMBEDDING_DIM_ENV), EMBEDDING_DIM_ENV)?
                .unwrap_or_else(default_embedding_dim),
        };
        if embedding_dim == 0 {
            bail!("embedding dimension must be at least 1");
        }

        let retrieval = RetrievalSettings {
            k_guideline: file.retrieval.k_guideline.unwrap_or_else(default_k),
            k_drug: file.retrieval.k_drug.unwrap_or_else(default_k),
            max_k,
            strategy: file.retrieval.strategy.unwrap_or_default(),
            alpha: file.retrieval.alpha.unwrap_or_else(default_alpha),
            k_rrf: file.retrieval.k_rrf.unwrap_or_else(default_k_rrf),
            topn: file.retrieval.topn.unwrap_or_else(default_topn),
        };

        Ok(Self {
            demo,
            output: file.output.clone(),
            guideline_db,
            drug_db,
            collection,
            embedding_dim,
            retrieval,
        })
    }

    /// Clamp a requested result count into `1..=max_k`.
    #[must_use]
    pub fn clamp_k(&self, k: usize) -> usize {
        k.clamp(1, self.retrieval.max_k)
    }
}

/// Find the config file: CLI flag, then `CAREMIND_CONFIG`, then
/// `./caremind.toml`, then the per-user config directory.
pub fn locate_config_file<F>(cli_path: Option<&Path>, env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Some(raw) = env(CONFIG_ENV).filter(|value| !value.trim().is_empty()) {
        return Some(PathBuf::from(raw));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("caremind").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Read and parse a config file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or not valid TOML for
/// [`FileConfig`].
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<FileConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("expected 1/0, got '{other}'"),
    }
}

fn parse_env<T>(raw: Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parse {key}='{value}'"))
    })
    .transpose()
}

fn default_guideline_db() -> PathBuf {
    PathBuf::from("./db/guidelines.sqlite")
}

fn default_drug_db() -> PathBuf {
    PathBuf::from("./db/drugs.sqlite")
}

fn default_collection() -> String {
    "guideline_chunks".to_string()
}

const fn default_k() -> usize {
    6
}

const fn default_max_k() -> usize {
    8
}

const fn default_alpha() -> f32 {
    0.6
}

const fn default_k_rrf() -> f32 {
    60.0
}

const fn default_topn() -> usize {
    8
}

const fn default_embedding_dim() -> usize {
    384
}
