//! Execution dispatcher and local pipeline executor.
//!
//! The dispatcher binds every job to one execution strategy at creation:
//! the in-process stage pipeline, or a handoff to an external worker via
//! the repo store. External collaborators (analysis, transform, thumbnail,
//! upload, notification) are reached only through the trait seams in
//! [`collaborators`], never through their internals.

pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod local;

pub use collaborators::{
    ArtifactKind, ArtifactUploader, MediaAnalyzer, MediaTransformer, Notifier, RemoteHandoff,
    StageProgressSender, ThumbnailCapture, UploadItem, UploadedArtifacts,
};
pub use config::PipelineConfig;
pub use dispatcher::{CreateJob, ExecutionDispatcher};
pub use error::{PipelineError, PipelineResult};
pub use local::LocalPipeline;
