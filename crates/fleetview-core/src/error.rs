//! Error types for Fleetview Core

use crate::attempt::AttemptId;
use crate::types::Stage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Cannot build video URL: {0}")]
    Resolution(String),

    // Transport errors
    #[error("Request failed: {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Decode errors
    #[error("No codec accepted for track {track_id} ({codec})")]
    CodecUnsupported { track_id: u32, codec: String },

    #[error("Demux failed: {0}")]
    Demux(String),

    #[error("Media sink error: {0}")]
    Sink(String),

    // Playback errors
    #[error("{stage} stage timed out after {after_ms}ms")]
    StageTimeout { stage: Stage, after_ms: u64 },

    #[error("Native playback failed: {0}")]
    NativePlayback(String),

    #[error("Attempt {0} was superseded")]
    StaleAttempt(AttemptId),

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error classes the orchestrator routes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No usable backend URL could be built
    ResolutionFailure,
    /// Fetch rejected or returned non-2xx
    TransportFailure,
    /// The sink rejected every codec string of an HEVC track
    CodecUnsupported,
    /// Demuxer or sink reported an internal error
    DemuxFailure,
    /// A stage made no progress within its budget
    StageTimeout,
    /// Callback for a superseded attempt
    StaleAttempt,
    /// Configuration, IO or state machine misuse
    Internal,
}

impl Error {
    /// Shorthand for a resolution failure
    pub fn resolution(msg: impl Into<String>) -> Self {
        Error::Resolution(msg.into())
    }

    /// Shorthand for a transport failure
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution(_) => ErrorKind::ResolutionFailure,
            Error::Transport { .. } | Error::HttpStatus { .. } | Error::Network(_) => {
                ErrorKind::TransportFailure
            }
            Error::CodecUnsupported { .. } => ErrorKind::CodecUnsupported,
            Error::Demux(_) | Error::Sink(_) | Error::NativePlayback(_) => ErrorKind::DemuxFailure,
            Error::StageTimeout { .. } => ErrorKind::StageTimeout,
            Error::StaleAttempt(_) => ErrorKind::StaleAttempt,
            Error::InvalidStateTransition { .. }
            | Error::InvalidConfig(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the segmented stage may hand over to native playback
    pub fn escalates(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransportFailure | ErrorKind::DemuxFailure | ErrorKind::StageTimeout
        )
    }

    /// Returns true if this is the superseded-attempt marker
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleAttempt(_))
    }

    /// Returns the error code for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Resolution(_) => "RESOLUTION",
            Error::Transport { .. } => "TRANSPORT",
            Error::HttpStatus { .. } => "HTTP_STATUS",
            Error::Network(_) => "NETWORK",
            Error::CodecUnsupported { .. } => "CODEC_UNSUPPORTED",
            Error::Demux(_) => "DEMUX",
            Error::Sink(_) => "SINK",
            Error::StageTimeout { .. } => "STAGE_TIMEOUT",
            Error::NativePlayback(_) => "NATIVE_PLAYBACK",
            Error::StaleAttempt(_) => "STALE_ATTEMPT",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
        }
    }
}
