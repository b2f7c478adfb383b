//! Core types for the sonicforge worker.
//!
//! - [`Job`]: the worker's view of a job record held by the job store
//! - [`JobPatch`]: changed fields sent back to the job store
//! - [`GenerationParams`]: validated per-job generation parameters

mod job;
mod request;

pub use job::{format_timestamp, Job, JobId, JobPatch, JobStatus};
pub use request::{
    validate_duration, validate_prompt, AudioFormat, GenerationParams, DEFAULT_DURATION_SEC,
    MAX_DURATION_SEC, MAX_PROMPT_CHARS, MIN_DURATION_SEC,
};
