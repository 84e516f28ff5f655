//! Pipeline stages and weighted progress aggregation.
//!
//! Each stage owns a fixed, disjoint sub-range of the overall 0-100 scale.
//! External collaborators report only stage-local percentages; the
//! aggregation here maps them to a single monotone number, so observers can
//! tell which stage a job is in purely from the reported value.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One ordered step of the local pipeline.
///
/// The split step runs inside the transform range when the output exceeds
/// the size ceiling and does not get a range of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Probe the input for technical properties
    Analyze,
    /// Apply the processing preset
    Transform,
    /// Capture the thumbnail
    Thumbnail,
    /// Upload all produced artifacts
    Upload,
    /// Record results and fire notifications
    Finalize,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Analyze => "analyze",
            PipelineStage::Transform => "transform",
            PipelineStage::Thumbnail => "thumbnail",
            PipelineStage::Upload => "upload",
            PipelineStage::Finalize => "finalize",
        }
    }
}

/// Fixed per-stage progress ranges over the overall 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StageRanges {
    pub analyze: (u8, u8),
    pub transform: (u8, u8),
    pub thumbnail: (u8, u8),
    pub upload: (u8, u8),
    pub finalize: (u8, u8),
}

impl Default for StageRanges {
    fn default() -> Self {
        Self {
            analyze: (10, 20),
            transform: (20, 60),
            thumbnail: (60, 70),
            upload: (70, 95),
            finalize: (95, 100),
        }
    }
}

impl StageRanges {
    /// The `[start, end]` range owned by a stage.
    pub fn range(&self, stage: PipelineStage) -> (u8, u8) {
        match stage {
            PipelineStage::Analyze => self.analyze,
            PipelineStage::Transform => self.transform,
            PipelineStage::Thumbnail => self.thumbnail,
            PipelineStage::Upload => self.upload,
            PipelineStage::Finalize => self.finalize,
        }
    }

    /// Map a stage-local percentage into the overall scale.
    ///
    /// Pure and clamped: for any `local` the result falls within the
    /// stage's range, and it is monotone in `local`.
    pub fn overall(&self, stage: PipelineStage, local: f64) -> u8 {
        let (start, end) = self.range(stage);
        let local = local.clamp(0.0, 100.0);
        // Tolerates an inverted range from hand-built configuration.
        let span = end.saturating_sub(start) as f64;
        let value = start as f64 + local * span / 100.0;
        (value.round() as u8).clamp(start.min(end), end.max(start))
    }

    /// Overall value at the start of a stage.
    pub fn stage_start(&self, stage: PipelineStage) -> u8 {
        self.range(stage).0
    }

    /// Overall value at the end of a stage.
    pub fn stage_end(&self, stage: PipelineStage) -> u8 {
        self.range(stage).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_midpoint() {
        let ranges = StageRanges::default();
        // Stage-local 50% within [20,60] lands at 40
        assert_eq!(ranges.overall(PipelineStage::Transform, 50.0), 40);
    }

    #[test]
    fn test_overall_clamped_to_range() {
        let ranges = StageRanges::default();
        for stage in [
            PipelineStage::Analyze,
            PipelineStage::Transform,
            PipelineStage::Thumbnail,
            PipelineStage::Upload,
            PipelineStage::Finalize,
        ] {
            let (start, end) = ranges.range(stage);
            for local in [-10.0, 0.0, 33.3, 100.0, 250.0] {
                let v = ranges.overall(stage, local);
                assert!(v >= start && v <= end, "{stage:?} {local} -> {v}");
            }
        }
    }

    #[test]
    fn test_overall_monotone_in_local() {
        let ranges = StageRanges::default();
        let mut prev = 0;
        for local in 0..=100 {
            let v = ranges.overall(PipelineStage::Upload, local as f64);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_overall_tolerates_inverted_range() {
        let ranges = StageRanges {
            upload: (95, 70),
            ..StageRanges::default()
        };
        for local in [0.0, 50.0, 100.0] {
            let v = ranges.overall(PipelineStage::Upload, local);
            assert!((70..=95).contains(&v), "{local} -> {v}");
        }
    }

    #[test]
    fn test_stage_boundaries() {
        let ranges = StageRanges::default();
        assert_eq!(ranges.stage_start(PipelineStage::Analyze), 10);
        assert_eq!(ranges.stage_end(PipelineStage::Transform), 60);
        assert_eq!(ranges.overall(PipelineStage::Finalize, 100.0), 100);
    }
}
