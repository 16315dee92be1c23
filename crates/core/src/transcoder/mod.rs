//! Transcoder module for converting fetched media.
//!
//! The [`MediaEngine`] trait is the subprocess boundary; [`FfmpegEngine`] is
//! the ffmpeg implementation. [`Transcoder`] sits on top of an engine and
//! turns its raw [`ExitOutcome`] into a verified output artifact or a
//! [`TranscodeError`].
//!
//! # Example
//!
//! ```ignore
//! use grabber_core::transcoder::{FfmpegEngine, OutputFormat, Transcoder, TranscoderConfig};
//!
//! let config = TranscoderConfig::default();
//! let engine = Arc::new(FfmpegEngine::new(config.clone()));
//! let transcoder = Transcoder::new(engine, config);
//!
//! transcoder.check_available().await?;
//! let output = transcoder.transcode(&source, OutputFormat::Mp3).await?;
//! println!("Wrote {} bytes to {}", output.size_bytes, output.path.display());
//! ```

mod config;
mod engine;
mod error;
mod ffmpeg;
mod process;
mod service;
mod types;

pub use config::TranscoderConfig;
pub use engine::MediaEngine;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegEngine;
pub use process::run_with_timeout;
pub use service::Transcoder;
pub use types::{ExitOutcome, OutputFormat, TranscodeInvocation};
