//! Pipeline configuration.

use mediaq_models::{ExecutionMode, StageRanges};

/// Process-wide pipeline configuration, read once at startup. The
/// execution mode is bound to each job at creation and never changes
/// mid-flight.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Execution strategy for newly created jobs
    pub mode: ExecutionMode,
    /// Processing preset name passed to the transform collaborator
    pub preset: String,
    /// Primary outputs larger than this are split into parts
    pub size_ceiling_bytes: u64,
    /// Offset into the media for thumbnail capture
    pub thumbnail_offset_secs: f64,
    /// Progress value a remote-queued job is parked at after handoff
    pub remote_handoff_progress: u8,
    /// Per-stage progress ranges
    pub ranges: StageRanges,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Local,
            preset: "standard".to_string(),
            size_ceiling_bytes: 500 * 1024 * 1024, // 500MB
            thumbnail_offset_secs: 3.0,
            remote_handoff_progress: 15,
            ranges: StageRanges::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            mode: std::env::var("MEDIAQ_EXECUTION_MODE")
                .map(|s| ExecutionMode::from_config(&s))
                .unwrap_or_default(),
            preset: std::env::var("MEDIAQ_PRESET").unwrap_or_else(|_| "standard".to_string()),
            size_ceiling_bytes: std::env::var("MEDIAQ_SIZE_CEILING_MB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(500 * 1024 * 1024),
            thumbnail_offset_secs: std::env::var("MEDIAQ_THUMBNAIL_OFFSET_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3.0),
            remote_handoff_progress: std::env::var("MEDIAQ_REMOTE_HANDOFF_PROGRESS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
            ranges: StageRanges::default(),
        }
    }
}
