//! charid Core
//!
//! Error handling and small shared types used by the charid crates.

pub mod error;
pub mod types;

pub use error::{BoxError, Error, Result};
pub use types::{ImageDims, InferenceMode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ImageDims, InferenceMode};
}
