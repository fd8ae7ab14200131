//! Error types for charid

/// Boxed error from a collaborating library (tensor backend, HTTP client, ...)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using charid's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for charid operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Classification attempted before a model handle exists
    #[error("model not loaded: call load_model() first")]
    ModelNotLoaded,

    /// Model artifact could not be fetched
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Model file could not be deserialized into a module
    #[error("model error: {0}")]
    Model(String),

    /// A tensor operation failed inside the preprocessing or inference chain
    #[error("tensor operation '{op}' failed: {source}")]
    Tensor {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// Forward pass failures and malformed model outputs
    #[error("inference error: {0}")]
    Inference(String),

    /// Input image errors
    #[error("image error: {0}")]
    Image(String),

    /// Class label table errors
    #[error("label table error: {0}")]
    Labels(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Wrap a backend error raised by the named tensor operation
    pub fn tensor(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Tensor {
            op,
            source: source.into(),
        }
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new image error
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new label table error
    pub fn labels(msg: impl Into<String>) -> Self {
        Self::Labels(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is the load-ordering precondition failure
    pub fn is_model_not_loaded(&self) -> bool {
        matches!(self, Self::ModelNotLoaded)
    }
}
