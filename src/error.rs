use thiserror::Error;

/// Boxed error produced by a [crate::store::SlidingWindowStore] backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// [Error] is the outcome of a rejected check.
///
/// Every internal failure is folded into exactly one of these two variants,
/// so callers can always tell "you are rate-limited" apart from
/// "we could not check".
#[derive(Debug, Error)]
pub enum Error {
    /// [LimitExceeded] indicates that the caller made too many requests
    /// in the current window, or could not be identified,
    /// or belongs to a category without configuration.
    #[error("limit exceeded")]
    LimitExceeded,

    /// [Store] indicates that the shared store could not answer,
    /// including an elapsed deadline. The request count is unknown.
    #[error("store error: {0}")]
    Store(#[source] BoxError),
}

impl Error {
    pub(crate) fn store<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(e))
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded)
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Errors raised while loading or querying a [crate::config::ConfigurationSet].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration registered for category {0}")]
    UnknownCategory(u32),

    #[error("category {category} has a limit of {limit} with an empty window")]
    ZeroWindow { category: u32, limit: u32 },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while building a [crate::limiter::Limiter] or a store.
/// Nothing is usable after one of these.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("invalid store client: {0}")]
    InvalidStore(String),

    #[error("missing identity extractor")]
    MissingExtractor,

    #[error("limiter name must not be empty")]
    EmptyName,

    #[error("limiter name or key prefix {0:?} contains the key separator")]
    InvalidName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}
