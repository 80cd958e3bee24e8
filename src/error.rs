//! Error types for the question answering engine.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for template persistence, rendering and the external adapters
#[derive(Debug, Error)]
pub enum Error {
    /// A stored template file could not be parsed
    #[error("Template format error in {template}: {reason}")]
    TemplateFormat { template: String, reason: String },

    /// Authored template input was rejected before writing
    #[error("Template validation error: {0}")]
    TemplateValidation(String),

    /// Template does not exist in the store
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// An answer placeholder could not be resolved
    #[error("Render error in template {template}: unresolved placeholder ({placeholder})")]
    Render {
        template: String,
        placeholder: String,
    },

    /// Query synthesis or execution failed
    #[error("Query error: {0}")]
    Query(String),

    /// Tokenizer/tagger adapter failed
    #[error("Tagger error: {0}")]
    Tagger(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a format error on a named template
    pub fn format(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::TemplateFormat {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only invalidates one template attempt
    pub fn is_render_error(&self) -> bool {
        matches!(self, Error::Render { .. })
    }

    /// Whether this error came from a collaborator outside the core
    pub fn is_external(&self) -> bool {
        matches!(self, Error::Query(_) | Error::Tagger(_) | Error::Io(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Query(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
