//! Core types shared across charid crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width and height of a decoded input image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

impl ImageDims {
    /// Create new image dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Side of the largest centered square that fits the image
    pub fn square_side(&self) -> u32 {
        self.width.min(self.height)
    }

    /// Whether both sides are non-zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Number of bytes in an RGB blob of these dimensions
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for ImageDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the forward pass is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Run the forward pass on the calling thread
    Blocking,
    /// Run the forward pass on the blocking pool and await it
    #[default]
    Offloaded,
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Offloaded => write!(f, "offloaded"),
        }
    }
}

impl FromStr for InferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocking" | "sync" => Ok(Self::Blocking),
            "offloaded" | "async" => Ok(Self::Offloaded),
            other => Err(format!(
                "unknown inference mode '{}', expected 'blocking' or 'offloaded'",
                other
            )),
        }
    }
}
