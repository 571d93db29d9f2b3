//! Fleetview Core - Recording playback for the fleet telematics console
//!
//! This crate provides the playback modal's control flow:
//! - Source parsing with pattern-based field recovery
//! - Backend URL resolution across device, storage and download servers
//! - Segmented MP4 playback through a buffered media sink
//! - Native element fallback
//! - Attempt tracking so abandoned requests never touch the page
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Playback Orchestrator                     │
//! │        (attempt ids, state machine, modal ownership)         │
//! └───────┬──────────────────┬──────────────────┬────────────────┘
//!         │                  │                  │
//!  ┌──────┴──────┐   ┌───────┴───────┐   ┌──────┴──────┐
//!  │     URL     │   │ Segmented MP4 │   │   Native    │
//!  │  Resolver   │   │    Player     │   │  Fallback   │
//!  └─────────────┘   └───────┬───────┘   └──────┬──────┘
//!                            │                  │
//!                    ┌───────┴───────┐   ┌──────┴──────┐
//!                    │ Sink + Demuxer│   │   Video     │
//!                    │ + Track Queues│   │  Element    │
//!                    └───────────────┘   └─────────────┘
//! ```
//!
//! Host capabilities (network, media sink, demuxer, video element, page
//! view) are supplied through the traits in [`media`] and [`view`].

pub mod attempt;
pub mod codec;
pub mod config;
pub mod error;
pub mod media;
pub mod native;
pub mod orchestrator;
pub mod presenter;
pub mod queue;
pub mod resolver;
pub mod segmented;
pub mod session;
pub mod source;
pub mod types;
pub mod view;

pub use attempt::{AttemptId, AttemptToken, AttemptTracker};
pub use config::{BackendConfig, PlayerConfig};
pub use error::{Error, ErrorKind, Result};
pub use media::{
    BufferId, DemuxEvent, Demuxer, ElementEvent, Fetcher, HttpFetcher, MediaBackend, MediaInfo,
    MediaSink, SinkEvent, TrackInfo, TrackKind, VideoElement,
};
pub use native::NativeFallbackPlayer;
pub use orchestrator::{PlaybackHandle, PlaybackOrchestrator};
pub use presenter::{ErrorPanel, ErrorPresenter, PanelKind};
pub use queue::{TrackAppendQueue, TrackQueues};
pub use resolver::{ResolvedUrl, UrlResolver};
pub use segmented::SegmentedMp4Player;
pub use session::{MediaPipeline, ModalState, PlaybackSession};
pub use source::{Extraction, SourceDescriptor};
pub use types::*;
pub use view::{PlayerView, RecordingView, ViewEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Fleetview Core initialized");
}
