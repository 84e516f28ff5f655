//! Shared domain models for mediaq.
//!
//! Pure data types used across the registry, pipeline, remote queue and
//! API crates: the job record and its state machine, pipeline stages with
//! weighted progress aggregation, and the event vocabulary published to
//! subscribers.

pub mod event;
pub mod job;
pub mod media;
pub mod stage;

pub use event::{JobEvent, JobEventType, StatusCounts};
pub use job::{ExecutionMode, Job, JobId, JobResult, JobStatus};
pub use media::MediaInfo;
pub use stage::{PipelineStage, StageRanges};
