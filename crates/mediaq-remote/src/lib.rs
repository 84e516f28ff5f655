//! Remote queue execution over a version-controlled store.
//!
//! The store is an external collaborator reached only through the
//! [`store::RepoStore`] contract: idempotent `write_file` (overwrite
//! semantics) and `read_file` (definite not-found). The queue executor
//! commits the input artifact for the external worker; the result poller
//! reconciles local state once a result appears.

pub mod error;
pub mod notify;
pub mod poller;
pub mod queue;
pub mod retry;
pub mod store;

pub use error::{RemoteError, RemoteResult};
pub use notify::IssueNotifier;
pub use poller::{PollerConfig, ResultPoller};
pub use queue::RemoteQueueExecutor;
pub use retry::RetryConfig;
pub use store::{HttpRepoStore, RepoStore, RepoStoreConfig};
