//! Technical properties of an input artifact, reported by the analyzer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Media file information returned by the analysis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
}

impl MediaInfo {
    /// Duration in milliseconds, for progress math.
    pub fn duration_ms(&self) -> i64 {
        (self.duration * 1000.0) as i64
    }
}
