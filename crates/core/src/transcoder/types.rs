//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::TranscodeError;

/// Target container/codec set for a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp3,
    M4a,
    Aac,
    Ogg,
    Opus,
    Flac,
    Wav,
    Mp4,
    Webm,
    Mkv,
}

impl OutputFormat {
    /// Every supported format, audio first.
    pub const ALL: [OutputFormat; 10] = [
        Self::Mp3,
        Self::M4a,
        Self::Aac,
        Self::Ogg,
        Self::Opus,
        Self::Flac,
        Self::Wav,
        Self::Mp4,
        Self::Webm,
        Self::Mkv,
    ];

    /// Lowercase name as accepted by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Aac => "aac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mkv => "mkv",
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Whether the video stream is dropped.
    pub fn is_audio_only(&self) -> bool {
        !matches!(self, Self::Mp4 | Self::Webm | Self::Mkv)
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }

    /// MIME type served with the delivered artifact.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Aac => "audio/aac",
            Self::Ogg => "audio/ogg",
            Self::Opus => "audio/opus",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
            Self::Mkv => "video/x-matroska",
        }
    }

    /// Whether the audio stream is copied instead of re-encoded.
    pub fn is_stream_copy(&self) -> bool {
        matches!(self, Self::Mkv)
    }

    /// Codec arguments placed between the input and the output path.
    ///
    /// The audio bitrate applies only to lossy re-encodes.
    pub fn codec_args(&self, audio_bitrate_kbps: u32) -> Vec<String> {
        let mut args: Vec<String> = match self {
            Self::Mp3 => vec!["-vn", "-c:a", "libmp3lame"],
            Self::M4a | Self::Aac => vec!["-vn", "-c:a", "aac"],
            Self::Ogg => vec!["-vn", "-c:a", "libvorbis"],
            Self::Opus => vec!["-vn", "-c:a", "libopus"],
            Self::Flac => vec!["-vn", "-c:a", "flac"],
            Self::Wav => vec!["-vn", "-c:a", "pcm_s16le"],
            Self::Mp4 => vec!["-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac"],
            Self::Webm => vec!["-c:v", "libvpx-vp9", "-c:a", "libopus"],
            Self::Mkv => vec!["-map", "0", "-c", "copy"],
        }
        .into_iter()
        .map(String::from)
        .collect();

        if !self.is_lossless() && !self.is_stream_copy() {
            args.push("-b:a".to_string());
            args.push(format!("{}k", audio_bitrate_kbps));
        }

        let container: &[&str] = match self {
            Self::M4a => &["-f", "ipod"],
            Self::Aac => &["-f", "adts"],
            Self::Mp4 => &["-movflags", "+faststart"],
            _ => &[],
        };
        args.extend(container.iter().map(|a| a.to_string()));
        args
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| TranscodeError::UnsupportedFormat {
                format: s.to_string(),
            })
    }
}

/// A single engine run: read `input`, write `output` in `format`.
#[derive(Debug, Clone)]
pub struct TranscodeInvocation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    /// Wall-clock limit for the run.
    pub timeout: Duration,
}

/// How an engine run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own. `code` is `None` when killed by a signal.
    Exited { code: Option<i32>, stderr: Vec<u8> },
    /// The process exceeded its time limit and was killed.
    TimedOut,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0), .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("mp3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!(" FLAC ".parse::<OutputFormat>().unwrap(), OutputFormat::Flac);
        assert_eq!(".webm".parse::<OutputFormat>().unwrap(), OutputFormat::Webm);
        assert!(matches!(
            "midi".parse::<OutputFormat>(),
            Err(TranscodeError::UnsupportedFormat { .. })
        ));
        assert!("".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_audio_formats_drop_video() {
        for format in OutputFormat::ALL {
            let args = format.codec_args(192);
            assert_eq!(format.is_audio_only(), args.contains(&"-vn".to_string()));
        }
    }

    #[test]
    fn test_lossless_has_no_bitrate() {
        assert!(!OutputFormat::Flac.codec_args(192).contains(&"-b:a".to_string()));
        assert!(!OutputFormat::Wav.codec_args(192).contains(&"-b:a".to_string()));

        let mp3 = OutputFormat::Mp3.codec_args(256);
        assert!(mp3.contains(&"libmp3lame".to_string()));
        assert!(mp3.contains(&"256k".to_string()));
    }

    #[test]
    fn test_bitrate_follows_lossless_flag() {
        for format in OutputFormat::ALL {
            let has_bitrate = format.codec_args(128).contains(&"128k".to_string());
            assert_eq!(
                has_bitrate,
                !format.is_lossless() && !format.is_stream_copy(),
                "{}",
                format
            );
        }

        let m4a = OutputFormat::M4a.codec_args(128);
        assert_eq!(&m4a[m4a.len() - 2..], &["-f".to_string(), "ipod".to_string()]);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&OutputFormat::M4a).unwrap();
        assert_eq!(json, "\"m4a\"");
        let parsed: OutputFormat = serde_json::from_str("\"opus\"").unwrap();
        assert_eq!(parsed, OutputFormat::Opus);
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(OutputFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(OutputFormat::Mkv.mime_type(), "video/x-matroska");
    }

    #[test]
    fn test_exit_outcome_success() {
        assert!(ExitOutcome::Exited {
            code: Some(0),
            stderr: Vec::new()
        }
        .success());
        assert!(!ExitOutcome::Exited {
            code: Some(1),
            stderr: Vec::new()
        }
        .success());
        assert!(!ExitOutcome::TimedOut.success());
    }
}
