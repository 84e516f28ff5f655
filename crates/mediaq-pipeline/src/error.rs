//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Split failed: {0}")]
    Split(String),

    #[error("Thumbnail failed: {0}")]
    Thumbnail(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Remote handoff failed: {0}")]
    RemoteHandoff(String),

    #[error("Registry error: {0}")]
    Registry(#[from] mediaq_registry::RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn split(msg: impl Into<String>) -> Self {
        Self::Split(msg.into())
    }

    pub fn thumbnail(msg: impl Into<String>) -> Self {
        Self::Thumbnail(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn remote_handoff(msg: impl Into<String>) -> Self {
        Self::RemoteHandoff(msg.into())
    }
}
