//! Mock services
//!
//! In-process stand-ins for the cluster service and object storage, used by
//! the unit and integration tests.
//!
//! - [`MockClusterService`]: scripted step states, request recording and
//!   per-operation failure injection
//! - [`MemoryObjectStore`]: uploads kept in memory
//! - [`RecordingObserver`]: captures poll progress

mod cluster;
mod failure;
mod observer;
mod store;

pub use cluster::MockClusterService;
pub use failure::{ApiOperation, FailureConfig, FailureInjector};
pub use observer::RecordingObserver;
pub use store::{MemoryObjectStore, StoredObject};
