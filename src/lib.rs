//! sonicforge-worker: music generation job worker.
//!
//! Pulls job ids from a Redis work queue (or polls the job tracking API when
//! the broker is unreachable), drives each job through
//! `pending → processing → completed | failed`, generates audio through a
//! remote backend, encodes it to WAV or MP3 and uploads the artifact.
//!
//! # Modules
//!
//! - [`types`]: Job records, patches and validated generation parameters
//! - [`config`]: Runtime configuration (WorkerConfig, QueueSettings)
//! - [`error`]: Error types and codes (WorkerError, ErrorCode)
//! - [`queue`]: Broker and polling consumption strategies
//! - [`processor`]: The per-job state machine
//! - [`worker`]: The sequential consumption loop
//! - [`store`], [`backend`], [`audio`], [`storage`]: Collaborators the processor calls into
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sonicforge_worker::{
//!     audio::StandardEncoder,
//!     backend::RemoteBackend,
//!     processor::JobProcessor,
//!     storage::LocalStorage,
//!     store::HttpJobStore,
//!     types::JobId,
//! };
//!
//! let store = Arc::new(HttpJobStore::new("http://localhost:5000", Duration::from_secs(10))?);
//! let backend = Arc::new(RemoteBackend::new("http://localhost:8000", Duration::from_secs(600))?);
//! let processor = JobProcessor::new(
//!     store,
//!     backend,
//!     Arc::new(StandardEncoder::default()),
//!     Arc::new(LocalStorage::new("./artifacts")),
//!     "facebook/musicgen-medium",
//! );
//!
//! let outcome = processor.process(&JobId::from("17")).await;
//! ```

pub mod audio;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod processor;
pub mod queue;
pub mod storage;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root for convenience
pub use config::{QueueSettings, WorkerConfig};
pub use error::{ErrorCode, Result, WorkerError};
pub use processor::{JobProcessor, ProcessOutcome};
pub use types::{AudioFormat, Job, JobId, JobPatch, JobStatus};
pub use worker::Worker;
