//! Error types for the overview pipeline.
//!
//! Collaborator traits ([`VectorStore`](crate::store::VectorStore),
//! [`Embedder`](crate::embedding::Embedder),
//! [`LanguageModel`](crate::llm::LanguageModel)) return `anyhow::Result` so
//! adapters can attach whatever context they like. The pipeline functions in
//! this crate classify those failures into [`OverviewError`].

/// Classified failure of a pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum OverviewError {
    /// Missing credential, store handle, or an invalid setting.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Failure reported by the embedding, model, or store collaborator.
    #[error("{service} call failed: {source:#}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A structured model response that does not match the expected schema.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, OverviewError>;

impl OverviewError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a collaborator failure, naming the service that produced it.
    pub fn external(service: &'static str, source: anyhow::Error) -> Self {
        Self::ExternalService { service, source }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
