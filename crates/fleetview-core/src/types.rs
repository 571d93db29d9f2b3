//! Shared playback types

use crate::error::ErrorKind;
use crate::presenter::PanelKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Storage Locations
// =============================================================================

/// Backend endpoint that may hold a copy of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    /// The vehicle device itself
    Device,
    /// Storage server
    Storage,
    /// Download server
    Download,
}

impl StorageLocation {
    /// Order in which locations are tried when none is named
    pub const PREFERENCE: [StorageLocation; 3] = [
        StorageLocation::Download,
        StorageLocation::Storage,
        StorageLocation::Device,
    ];

    /// Location code carried in the `LOC` query parameter
    pub fn code(self) -> u8 {
        match self {
            StorageLocation::Device => 1,
            StorageLocation::Storage => 2,
            StorageLocation::Download => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageLocation::Device => "device",
            StorageLocation::Storage => "storage",
            StorageLocation::Download => "download",
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(StorageLocation::Device),
            "storage" => Ok(StorageLocation::Storage),
            "download" => Ok(StorageLocation::Download),
            other => Err(format!("unknown storage location '{}'", other)),
        }
    }
}

/// Stream endpoint recognised from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// `/3/5` recording playback
    Recording,
    /// `/3/3` live stream
    Live,
}

impl StreamKind {
    /// Classify a URL path
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.ends_with("/3/5") {
            Some(StreamKind::Recording)
        } else if trimmed.ends_with("/3/3") {
            Some(StreamKind::Live)
        } else {
            None
        }
    }
}

// =============================================================================
// Playback State Machine
// =============================================================================

/// Playback strategy being tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Demux into a buffered media sink
    SegmentedMp4,
    /// Hand the URL to the media element
    Native,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SegmentedMp4 => write!(f, "segmented-mp4"),
            Stage::Native => write!(f, "native"),
        }
    }
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Modal closed, nothing in flight
    Idle,
    /// Building the backend URL
    ResolvingUrl,
    /// Segmented MP4 stage running
    TryingSegmentedMp4,
    /// Native element stage running
    TryingNative,
    /// Video is playable
    Succeeded,
    /// An error panel is shown
    Failed,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // Opening a modal or closing it is always allowed
            (_, ResolvingUrl) | (_, Idle) |
            // From ResolvingUrl
            (ResolvingUrl, TryingSegmentedMp4) | (ResolvingUrl, TryingNative) | (ResolvingUrl, Failed) |
            // From TryingSegmentedMp4
            (TryingSegmentedMp4, Succeeded) | (TryingSegmentedMp4, TryingNative) | (TryingSegmentedMp4, Failed) |
            // From TryingNative
            (TryingNative, Succeeded) | (TryingNative, Failed)
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::ResolvingUrl => write!(f, "resolving-url"),
            PlaybackState::TryingSegmentedMp4 => write!(f, "trying-segmented-mp4"),
            PlaybackState::TryingNative => write!(f, "trying-native"),
            PlaybackState::Succeeded => write!(f, "succeeded"),
            PlaybackState::Failed => write!(f, "failed"),
        }
    }
}

/// How a playback attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Video became playable
    Playing { stage: Stage },
    /// An error panel replaced the video
    Failed {
        panel: PanelKind,
        kind: ErrorKind,
        reason: String,
    },
    /// A newer attempt started or the modal closed first
    Superseded,
    /// The attempt task panicked before settling
    Crashed { reason: String },
}

impl PlaybackOutcome {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackOutcome::Playing { .. })
    }
}
