// Error types for the jukebox
// Each component has its own enum; the public component APIs mostly report
// plain success/failure, so these flow internally and get logged at the edge.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("track {0} already exists")]
    DuplicateId(String),

    #[error("rating {0} is outside 0-5")]
    InvalidRating(u8),

    #[error("unsupported audio file {0:?} (expected .mp3 or .wav)")]
    UnsupportedAudio(PathBuf),

    #[error("library file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("library csv: {0}")]
    Csv(#[from] csv::Error),
}

impl LibraryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibraryError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist {0} does not exist")]
    NotFound(String),

    #[error("invalid playlist name {0:?}")]
    InvalidName(String),

    #[error("playlist file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to open audio file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio backend failed while loading {0:?}")]
    BackendPanic(PathBuf),

    #[error("audio decode failed: {0}. File may be corrupted or invalid format.")]
    Decode(#[from] rodio::decoder::DecoderError),
}

#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("YouTube API key not configured")]
    MissingApiKey,

    #[error("API quota exceeded or invalid API key")]
    QuotaExceeded,

    #[error("YouTube API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("ffmpeg is not available: {0}")]
    FfmpegMissing(String),

    #[error("failed to run yt-dlp: {0}. Is yt-dlp installed?")]
    Spawn(std::io::Error),

    #[error("yt-dlp failed: {0}")]
    YtDlp(String),

    #[error("download completed but audio file {0:?} not found")]
    AudioMissing(PathBuf),

    #[error("thumbnail download failed: {0}")]
    Thumbnail(#[from] reqwest::Error),

    #[error("failed to add track {0} to library")]
    Library(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
