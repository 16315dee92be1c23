pub mod artifact;
pub mod config;
pub mod credentials;
pub mod fetcher;
pub mod metrics;
pub mod pipeline;
pub mod testing;
pub mod transcoder;

pub use artifact::{JobWorkspace, TempArtifact};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    SanitizedConfig,
};
pub use credentials::{spawn_watcher, CookieStore, Credential, CredentialError};
pub use fetcher::{FetchError, Fetcher, FetcherConfig, HttpFetcher};
pub use pipeline::{
    Artifact, FailureReason, JobPipeline, JobSnapshot, JobState, PipelineConfig, PipelineError,
    PipelineStatus,
};
pub use transcoder::{
    FfmpegEngine, MediaEngine, OutputFormat, TranscodeError, Transcoder, TranscoderConfig,
};
