//! Job registry and event broadcaster.
//!
//! The registry is the single source of truth for job state. All writes go
//! through its narrow update operations, which serialize mutations per job
//! id and publish the corresponding events. The broadcaster fans those
//! events out over a global topic and lazily-created per-job topics;
//! transports (WebSocket, long-poll) are thin adapters on top.

pub mod broadcast;
pub mod error;
pub mod registry;
pub mod stats;

pub use broadcast::EventBroadcaster;
pub use error::{RegistryError, RegistryResult};
pub use registry::JobRegistry;
pub use stats::StatsBroadcaster;
