/// Unified error types for cede
use thiserror::Error;

/// Main error type for key resolution and group enumeration
#[derive(Error, Debug)]
pub enum CedeError {
    /// Bad command-line invocation
    #[error("{0}")]
    Usage(String),

    /// Policy file unreadable or invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Identity that is not shaped like `local@domain`
    #[error("parsing address={0}")]
    Parse(String),

    /// Identity provider call failed
    #[error("Directory error: {0}")]
    Directory(String),

    /// No matching user, or no active key for that user
    #[error("{0}")]
    NotFound(String),

    /// Cache entry absent, unreadable or corrupt
    #[error("Cache read error: {0}")]
    CacheRead(String),

    /// Key was fetched but could not be persisted.
    ///
    /// `key_body` holds the fetched key so a caller may still use it.
    #[error("writing to cache: {message}")]
    CacheWrite { key_body: String, message: String },

    /// Capability that is intentionally not provided
    #[error("{0} is not supported")]
    Unsupported(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CedeError {
    /// True for the outcomes that mean "no key for this user"
    pub fn is_not_found(&self) -> bool {
        matches!(self, CedeError::NotFound(_))
    }
}

/// Result type alias for cede operations
pub type CedeResult<T> = Result<T, CedeError>;
