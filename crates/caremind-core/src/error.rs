use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for CLI output and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StoreNotFound,
    GuidelineIndexEmpty,
    StoreSchemaMismatch,
    EmptyQuery,
    InvalidParameter,
    DrugNotFound,
    ProviderUnavailable,
    FtsIndexMissing,
    EmbeddingFailed,
    IngestRecordInvalid,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StoreNotFound => "E1002",
            Self::GuidelineIndexEmpty => "E1003",
            Self::StoreSchemaMismatch => "E1004",
            Self::EmptyQuery => "E2001",
            Self::InvalidParameter => "E2002",
            Self::DrugNotFound => "E2003",
            Self::ProviderUnavailable => "E3001",
            Self::FtsIndexMissing => "E3002",
            Self::EmbeddingFailed => "E3003",
            Self::IngestRecordInvalid => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StoreNotFound => "Store database not found",
            Self::GuidelineIndexEmpty => "No non-empty guideline collection",
            Self::StoreSchemaMismatch => "Store schema version mismatch",
            Self::EmptyQuery => "Query is empty",
            Self::InvalidParameter => "Invalid retrieval parameter",
            Self::DrugNotFound => "Drug not found",
            Self::ProviderUnavailable => "Retrieval provider unavailable",
            Self::FtsIndexMissing => "Drug FTS index missing",
            Self::EmbeddingFailed => "Embedding failed",
            Self::IngestRecordInvalid => "Invalid ingest record",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in caremind.toml and retry."),
            Self::StoreNotFound => Some(
                "Run `caremind load-drugs` / `caremind index-guidelines`, or set CAREMIND_SQLITE_PATH / CAREMIND_GUIDELINE_DB.",
            ),
            Self::GuidelineIndexEmpty => {
                Some("Index guideline chunks with `caremind index-guidelines` first.")
            }
            Self::StoreSchemaMismatch => Some(
                "Run `caremind load-drugs` / `caremind index-guidelines` against the store to upgrade it.",
            ),
            Self::EmptyQuery => Some("Provide a non-empty clinical question."),
            Self::InvalidParameter => {
                Some("Use alpha in [0, 1], k_rrf > 0 and topn >= 1.")
            }
            Self::DrugNotFound => Some("Check the spelling or try the generic name."),
            Self::ProviderUnavailable => {
                Some("Enable demo mode (CAREMIND_DEMO=1) to degrade to empty evidence.")
            }
            Self::FtsIndexMissing => Some("Reload drugs with `caremind load-drugs --with-fts`."),
            Self::EmbeddingFailed => None,
            Self::IngestRecordInvalid => Some("Every drug record needs a name column."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure modes of the retrieval contract.
///
/// Providers and the hybrid retriever return this type so callers can
/// decide per variant whether to degrade (substitute empty evidence) or
/// propagate.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The query was empty or whitespace-only.
    #[error("query must not be empty")]
    EmptyQuery,

    /// The backing index or store is missing or unreachable.
    #[error("{provider} provider unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },

    /// A fusion or retrieval parameter is out of range.
    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Any other store-level failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl RetrievalError {
    pub fn unavailable(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            reason: reason.into(),
        }
    }

    pub fn invalid(name: &'static str, value: impl fmt::Display, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyQuery => ErrorCode::EmptyQuery,
            Self::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::Store(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Errors an orchestration layer may recover from by using empty evidence.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. } | Self::Store(_))
    }
}

/// Typed store-plumbing failures. They travel inside `anyhow::Error` and are
/// recovered by downcasting where an [`ErrorCode`] is needed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("store {} has schema version {found}, expected {expected}", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::StoreNotFound,
            Self::SchemaMismatch { .. } => ErrorCode::StoreSchemaMismatch,
            Self::InvalidRecord { .. } => ErrorCode::IngestRecordInvalid,
        }
    }
}
