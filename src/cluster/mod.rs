//! Cluster layer: index workers, the scatter-gather sentinel, and the
//! startup-chosen indexing frontend.

pub mod handle;
pub mod sentinel;
pub mod worker;

pub use handle::IndexHandle;
pub use sentinel::{ConnectionPool, Sentinel};
pub use worker::{IndexWorker, WorkerHandler, INDEX_SERVICE};
