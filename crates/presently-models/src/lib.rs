//! Shared data models for the Presently backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their lifecycle transitions
//! - The fixed pipeline stage table
//! - HTTP request/response payloads for generation and progress polling

pub mod error;
pub mod job;
pub mod request;
pub mod stage;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{ErrorKind, JobId, JobRecord, JobStatus};
pub use request::{GenerateRequest, GenerateResponse, ProgressResponse};
pub use stage::Stage;
