//! Error types for query compilation.

use thiserror::Error;

/// The main error type for compilation and rendering.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The declarative query has a shape no transformer accepts.
    #[error("Unsupported query: {0}")]
    Unsupported(String),

    /// An explicit alias was requested for a source already registered under another alias.
    #[error("Alias '{alias}' conflicts with the alias already registered for source {source_id}")]
    AliasConflict { alias: String, source_id: u64 },

    /// A parameterized membership list cannot be expanded.
    #[error("Cannot build membership expression: {0}")]
    MembershipExpression(String),

    /// A build context or AST node was used outside its contract.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The dialect cannot express the statement.
    #[error("Render error: {0}")]
    Render(String),

    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    #[error("Unknown member '{member}' on '{entity}'")]
    UnknownMember { entity: String, member: String },

    /// Invalid data type descriptor.
    #[error("Invalid type descriptor at position {position}: {message}")]
    TypeDescriptor { position: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// Create an unsupported-shape error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an internal contract violation error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    pub fn type_descriptor(position: usize, message: impl Into<String>) -> Self {
        Self::TypeDescriptor {
            position,
            message: message.into(),
        }
    }

    /// True for errors that indicate a bug in the transformer chain rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Result type alias for compilation.
pub type QueryResult<T> = Result<T, QueryError>;
