//! Job pipeline: fetch, transcode and deliver one source per job.
//!
//! [`JobPipeline`] admits jobs against a bounded [`SlotPool`], runs each in
//! its own task and workspace, and keeps an in-memory record of every job
//! until its retention period expires.
//!
//! Each job moves through `pending -> fetching -> transcoding -> done`, with
//! `failed` reachable from any non-terminal state. The job's workspace is
//! removed and its slot released before the terminal state becomes visible.
//!
//! # Example
//!
//! ```ignore
//! use grabber_core::pipeline::{JobPipeline, PipelineConfig};
//!
//! let pipeline = JobPipeline::new(PipelineConfig::default(), store, fetcher, transcoder);
//! pipeline.start().await?;
//!
//! let job = pipeline.submit("https://media.example.com/clip", "mp3").await?;
//! let snapshot = pipeline.status(&job.id).await?;
//! println!("{} is {}", snapshot.id, snapshot.state);
//! ```

mod config;
mod error;
mod processor;
mod slots;
mod types;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use processor::JobPipeline;
pub use slots::{AdmissionTicket, SlotPermit, SlotPool};
pub use types::{
    Artifact, FailureReason, JobCounts, JobId, JobSnapshot, JobState, PipelineStatus, PoolStatus,
};
