//! Media capability seams
//!
//! The playback stages talk to the browser (or any other host) only through
//! these traits:
//! - [`Fetcher`] downloads a complete payload
//! - [`MediaSink`] is the buffered media sink bound to the video element
//! - [`Demuxer`] turns an MP4 payload into fragmented per-track segments
//! - [`VideoElement`] is the element used for native playback
//! - [`MediaBackend`] reports capabilities and creates the above
//!
//! Sinks and demuxers are shared handles with interior state, like their
//! browser counterparts; their asynchronous signals arrive on unbounded
//! channels handed out at creation.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument};
use url::Url;

// =============================================================================
// Fetching
// =============================================================================

/// Downloads a complete payload
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the whole body; non-2xx responses are errors
    async fn fetch(&self, url: &Url) -> Result<Bytes>;
}

/// [`Fetcher`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::transport(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::transport(url.as_str(), e.to_string()))?;

        debug!(bytes = data.len(), "Payload fetched");
        Ok(data)
    }
}

// =============================================================================
// Buffered media sink
// =============================================================================

/// Handle of one per-track buffer inside a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u32);

/// Signals raised by a sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// The sink is attached and accepts buffers
    SourceOpen,
    /// A buffer finished its append and is ready for more
    UpdateEnd(BufferId),
    /// The sink failed
    Error(String),
}

/// Receiver of [`SinkEvent`]s
pub type SinkEvents = mpsc::UnboundedReceiver<SinkEvent>;

/// Buffered media sink bound to the video element
pub trait MediaSink: Send + Sync {
    /// Create a buffer for a MIME type; `Err` when the type is rejected
    fn add_buffer(&self, mime: &str) -> Result<BufferId>;

    /// Start appending a segment; completion is signalled by `UpdateEnd`
    fn append(&self, buffer: BufferId, data: Bytes) -> Result<()>;

    /// Set the overall media duration in seconds
    fn set_duration(&self, secs: f64);

    /// Signal that no more data will be appended
    fn end_of_stream(&self) -> Result<()>;

    /// Ranges of media time that can be played
    fn buffered(&self) -> Vec<(f64, f64)>;

    /// Detach and release the sink
    fn close(&self) -> Result<()>;

    /// Returns true once any non-empty range is buffered
    fn has_buffered(&self) -> bool {
        self.buffered().iter().any(|(start, end)| end > start)
    }
}

// =============================================================================
// Demuxing
// =============================================================================

/// Track media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Track metadata reported by the demuxer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: u32,
    pub kind: TrackKind,
    /// RFC 6381 codec string, e.g. `avc1.64001f`
    pub codec: String,
}

/// File metadata reported by the demuxer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub tracks: Vec<TrackInfo>,
}

/// Initialization segment of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSegment {
    pub track_id: u32,
    pub data: Bytes,
}

/// Signals raised by a demuxer
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxEvent {
    /// Metadata is known
    Ready(MediaInfo),
    /// A media segment was produced
    Segment {
        track_id: u32,
        data: Bytes,
        is_last: bool,
    },
    /// The demuxer failed
    Error(String),
}

/// Receiver of [`DemuxEvent`]s
pub type DemuxEvents = mpsc::UnboundedReceiver<DemuxEvent>;

/// Incremental MP4 demuxer producing fragmented segments
pub trait Demuxer: Send + Sync {
    /// Feed bytes starting at `file_start`
    fn append(&self, data: Bytes, file_start: u64) -> Result<()>;

    /// No more bytes will be fed
    fn flush(&self);

    /// Request segments for a track
    fn configure_track(&self, track_id: u32, samples_per_segment: u32);

    /// Initialization segments of every configured track
    fn initialize_segmentation(&self) -> Result<Vec<InitSegment>>;

    /// Begin producing `Segment` events
    fn start(&self);

    /// Stop producing events
    fn stop(&self);
}

// =============================================================================
// Native element
// =============================================================================

/// Listener registration on a [`VideoElement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Signals raised by the video element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    /// Enough data to start playing
    CanPlay,
    /// Loading or decoding failed
    Error(String),
}

/// The page's video element
#[async_trait]
pub trait VideoElement: Send + Sync {
    /// Point the element at a URL
    fn set_source(&self, url: &str);

    /// Attach a listener; events arrive on the returned channel
    fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<ElementEvent>);

    /// Detach one listener
    fn unsubscribe(&self, listener: ListenerId);

    /// Returns true when the current frame can be shown
    fn has_current_data(&self) -> bool;

    /// Stop playback; a no-op when nothing is playing
    fn pause(&self);

    /// Drop the current source and release whatever it loaded
    fn clear_source(&self);

    /// Start playback; `Err` when autoplay is refused
    async fn play(&self) -> Result<()>;
}

// =============================================================================
// Backend
// =============================================================================

/// Host capabilities and factories
pub trait MediaBackend: Send + Sync {
    /// Demuxer and buffered sink are both available
    fn supports_segmented(&self) -> bool;

    /// Create a sink bound to the video element
    fn create_sink(&self) -> Result<(Arc<dyn MediaSink>, SinkEvents)>;

    /// Create a demuxer instance
    fn create_demuxer(&self) -> Result<(Arc<dyn Demuxer>, DemuxEvents)>;

    /// The video element of the modal
    fn video(&self) -> Arc<dyn VideoElement>;
}
