//! Scriptable host doubles for playback tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use fleetview_core::{
    media::{DemuxEvents, InitSegment, ListenerId, SinkEvents},
    BufferId, DemuxEvent, Demuxer, ElementEvent, Error, Fetcher, MediaBackend, MediaInfo,
    MediaSink, PlaybackOrchestrator, PlayerConfig, RecordingView, Result, SinkEvent, TrackInfo,
    TrackKind, VideoElement,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use url::Url;

pub const PLAYBACK_URL: &str = "http://10.0.0.5:6604/3/5?DownType=5&DevIDNO=50012&FILELOC=2\
    &FILECHN=0&FILEBEG=3600&FILEEND=3900&PLAYFILE=%2Fmnt%2Fhd1%2F2024-05-12%2Fch1.mp4\
    &jsession=abc123";

/// Poll `cond` on the (possibly paused) tokio clock
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// =============================================================================
// Fetcher
// =============================================================================

#[derive(Clone)]
pub enum FetchBehavior {
    Respond(Bytes),
    Reject(String),
    Status(u16),
    Hang,
    Gated(Arc<Notify>, Bytes),
}

/// Plays scripted behaviours in order; the last one repeats
pub struct MockFetcher {
    script: Mutex<VecDeque<FetchBehavior>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new(behaviors: Vec<FetchBehavior>) -> Self {
        Self {
            script: Mutex::new(behaviors.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn responding() -> Self {
        Self::new(vec![FetchBehavior::Respond(Bytes::from_static(b"ftypisom....moov....mdat"))])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self) -> FetchBehavior {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(FetchBehavior::Hang)
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        self.calls.lock().unwrap().push(url.to_string());
        let behavior = self.next();
        match behavior {
            FetchBehavior::Respond(data) => Ok(data),
            FetchBehavior::Reject(reason) => Err(Error::transport(url.as_str(), reason)),
            FetchBehavior::Status(status) => Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            }),
            FetchBehavior::Hang => std::future::pending().await,
            FetchBehavior::Gated(gate, data) => {
                gate.notified().await;
                Ok(data)
            }
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct SinkLog {
    pub buffers: Vec<String>,
    pub rejected: Vec<String>,
    pub appends: Vec<(BufferId, Bytes)>,
    pub duration: Option<f64>,
    pub end_of_stream: usize,
    pub close_calls: usize,
}

pub struct MockSink {
    log: Mutex<SinkLog>,
    events: mpsc::UnboundedSender<SinkEvent>,
    accept: fn(&str) -> bool,
    closed: AtomicBool,
}

impl MockSink {
    pub fn log(&self) -> SinkLog {
        self.log.lock().unwrap().clone()
    }

    /// Release the sink behind the pipeline's back
    pub fn close_externally(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn appended_to(&self, buffer: BufferId) -> Vec<Bytes> {
        self.log()
            .appends
            .into_iter()
            .filter(|(b, _)| *b == buffer)
            .map(|(_, data)| data)
            .collect()
    }
}

impl MediaSink for MockSink {
    fn add_buffer(&self, mime: &str) -> Result<BufferId> {
        let mut log = self.log.lock().unwrap();
        if (self.accept)(mime) {
            log.buffers.push(mime.to_string());
            Ok(BufferId(log.buffers.len() as u32 - 1))
        } else {
            log.rejected.push(mime.to_string());
            Err(Error::Sink(format!("NotSupportedError: {}", mime)))
        }
    }

    fn append(&self, buffer: BufferId, data: Bytes) -> Result<()> {
        self.log.lock().unwrap().appends.push((buffer, data));
        let _ = self.events.send(SinkEvent::UpdateEnd(buffer));
        Ok(())
    }

    fn set_duration(&self, secs: f64) {
        self.log.lock().unwrap().duration = Some(secs);
    }

    fn end_of_stream(&self) -> Result<()> {
        self.log.lock().unwrap().end_of_stream += 1;
        Ok(())
    }

    fn buffered(&self) -> Vec<(f64, f64)> {
        let appended = self.log.lock().unwrap().appends.len();
        if appended == 0 {
            Vec::new()
        } else {
            vec![(0.0, appended as f64)]
        }
    }

    fn close(&self) -> Result<()> {
        self.log.lock().unwrap().close_calls += 1;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::Sink("InvalidStateError: already closed".into()));
        }
        Ok(())
    }
}

pub fn accept_all(_: &str) -> bool {
    true
}

pub fn reject_hevc(mime: &str) -> bool {
    !(mime.contains("hvc1") || mime.contains("hev1"))
}

pub fn reject_audio(mime: &str) -> bool {
    !mime.contains("mp4a")
}

pub fn reject_avc_and_aac(mime: &str) -> bool {
    !(mime.contains("avc1") || mime.contains("mp4a"))
}

// =============================================================================
// Demuxer
// =============================================================================

#[derive(Debug, Clone)]
pub struct DemuxScript {
    pub info: MediaInfo,
    pub segments_per_track: usize,
    pub error_on_flush: Option<String>,
}

impl DemuxScript {
    pub fn tracks(tracks: Vec<TrackInfo>) -> Self {
        Self {
            info: MediaInfo { duration: 300.0, tracks },
            segments_per_track: 3,
            error_on_flush: None,
        }
    }

    pub fn avc_with_audio() -> Self {
        Self::tracks(vec![video_track(1, "avc1.64001f"), audio_track(2)])
    }
}

pub fn video_track(id: u32, codec: &str) -> TrackInfo {
    TrackInfo { id, kind: TrackKind::Video, codec: codec.to_string() }
}

pub fn audio_track(id: u32) -> TrackInfo {
    TrackInfo { id, kind: TrackKind::Audio, codec: "mp4a.40.2".to_string() }
}

pub fn init_bytes(track: u32) -> Bytes {
    Bytes::from(format!("init-{}", track))
}

pub fn segment_bytes(track: u32, index: usize) -> Bytes {
    Bytes::from(format!("t{}-s{}", track, index))
}

#[derive(Debug, Default, Clone)]
pub struct DemuxLog {
    pub fed_bytes: usize,
    pub configured: Vec<u32>,
    pub starts: usize,
    pub stops: usize,
}

pub struct MockDemuxer {
    script: DemuxScript,
    events: mpsc::UnboundedSender<DemuxEvent>,
    log: Mutex<DemuxLog>,
}

impl MockDemuxer {
    pub fn log(&self) -> DemuxLog {
        self.log.lock().unwrap().clone()
    }
}

impl Demuxer for MockDemuxer {
    fn append(&self, data: Bytes, _file_start: u64) -> Result<()> {
        self.log.lock().unwrap().fed_bytes += data.len();
        Ok(())
    }

    fn flush(&self) {
        let event = match &self.script.error_on_flush {
            Some(msg) => DemuxEvent::Error(msg.clone()),
            None => DemuxEvent::Ready(self.script.info.clone()),
        };
        let _ = self.events.send(event);
    }

    fn configure_track(&self, track_id: u32, _samples_per_segment: u32) {
        self.log.lock().unwrap().configured.push(track_id);
    }

    fn initialize_segmentation(&self) -> Result<Vec<InitSegment>> {
        Ok(self
            .log()
            .configured
            .iter()
            .map(|&track_id| InitSegment { track_id, data: init_bytes(track_id) })
            .collect())
    }

    fn start(&self) {
        let configured = {
            let mut log = self.log.lock().unwrap();
            log.starts += 1;
            log.configured.clone()
        };
        let count = self.script.segments_per_track;
        for index in 0..count {
            for &track_id in &configured {
                let _ = self.events.send(DemuxEvent::Segment {
                    track_id,
                    data: segment_bytes(track_id, index),
                    is_last: index + 1 == count,
                });
            }
        }
    }

    fn stop(&self) {
        self.log.lock().unwrap().stops += 1;
    }
}

// =============================================================================
// Video element
// =============================================================================

#[derive(Debug, Clone)]
pub enum NativeBehavior {
    CanPlay,
    Error(String),
    Silent,
    /// `set_source` panics
    Panic,
}

pub struct MockVideo {
    behavior: Mutex<NativeBehavior>,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<ElementEvent>>>,
    next_listener: AtomicU64,
    sources: Mutex<Vec<String>>,
    current: Mutex<Option<String>>,
    plays: AtomicUsize,
    pauses: AtomicUsize,
    clears: AtomicUsize,
    has_data: AtomicBool,
}

impl MockVideo {
    pub fn new(behavior: NativeBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            sources: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            has_data: AtomicBool::new(false),
        }
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    /// Source the element currently holds
    pub fn current_source(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn listeners(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn set_has_data(&self, value: bool) {
        self.has_data.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoElement for MockVideo {
    fn set_source(&self, url: &str) {
        self.sources.lock().unwrap().push(url.to_string());
        *self.current.lock().unwrap() = Some(url.to_string());
        let behavior = self.behavior.lock().unwrap().clone();
        let event = match behavior {
            NativeBehavior::CanPlay => Some(ElementEvent::CanPlay),
            NativeBehavior::Error(msg) => Some(ElementEvent::Error(msg)),
            NativeBehavior::Silent => None,
            NativeBehavior::Panic => panic!("element rejected source {}", url),
        };
        if let Some(event) = event {
            for listener in self.listeners.lock().unwrap().values() {
                let _ = listener.send(event.clone());
            }
        }
    }

    fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<ElementEvent>) {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().insert(id, tx);
        (ListenerId(id), rx)
    }

    fn unsubscribe(&self, listener: ListenerId) {
        self.listeners.lock().unwrap().remove(&listener.0);
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn clear_source(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
    }

    fn has_current_data(&self) -> bool {
        self.has_data.load(Ordering::SeqCst)
    }

    async fn play(&self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Err(Error::NativePlayback("NotAllowedError: play() requires a user gesture".into()))
    }
}

// =============================================================================
// Backend
// =============================================================================

pub struct MockBackend {
    segmented: bool,
    accept: fn(&str) -> bool,
    sink_error: Option<String>,
    script: DemuxScript,
    video: Arc<MockVideo>,
    sinks: Mutex<Vec<Arc<MockSink>>>,
    demuxers: Mutex<Vec<Arc<MockDemuxer>>>,
}

impl MockBackend {
    pub fn new(segmented: bool, native: NativeBehavior) -> Self {
        Self {
            segmented,
            accept: accept_all,
            sink_error: None,
            script: DemuxScript::avc_with_audio(),
            video: Arc::new(MockVideo::new(native)),
            sinks: Mutex::new(Vec::new()),
            demuxers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, script: DemuxScript) -> Self {
        self.script = script;
        self
    }

    pub fn with_accept(mut self, accept: fn(&str) -> bool) -> Self {
        self.accept = accept;
        self
    }

    /// Sinks report an error instead of opening
    pub fn with_sink_error(mut self, message: &str) -> Self {
        self.sink_error = Some(message.to_string());
        self
    }

    pub fn mock_video(&self) -> Arc<MockVideo> {
        self.video.clone()
    }

    pub fn sinks(&self) -> Vec<Arc<MockSink>> {
        self.sinks.lock().unwrap().clone()
    }

    pub fn demuxers(&self) -> Vec<Arc<MockDemuxer>> {
        self.demuxers.lock().unwrap().clone()
    }

    /// Sink and demuxer that are not registered with any backend
    pub fn detached_pipeline() -> (Arc<MockSink>, Arc<MockDemuxer>) {
        let (sink_tx, _) = mpsc::unbounded_channel();
        let (demux_tx, _) = mpsc::unbounded_channel();
        let sink = Arc::new(MockSink {
            log: Mutex::new(SinkLog::default()),
            events: sink_tx,
            accept: accept_all,
            closed: AtomicBool::new(false),
        });
        let demuxer = Arc::new(MockDemuxer {
            script: DemuxScript::avc_with_audio(),
            events: demux_tx,
            log: Mutex::new(DemuxLog::default()),
        });
        (sink, demuxer)
    }
}

impl MediaBackend for MockBackend {
    fn supports_segmented(&self) -> bool {
        self.segmented
    }

    fn create_sink(&self) -> Result<(Arc<dyn MediaSink>, SinkEvents)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = match &self.sink_error {
            Some(message) => tx.send(SinkEvent::Error(message.clone())),
            None => tx.send(SinkEvent::SourceOpen),
        };
        let sink = Arc::new(MockSink {
            log: Mutex::new(SinkLog::default()),
            events: tx,
            accept: self.accept,
            closed: AtomicBool::new(false),
        });
        self.sinks.lock().unwrap().push(sink.clone());
        Ok((sink, rx))
    }

    fn create_demuxer(&self) -> Result<(Arc<dyn Demuxer>, DemuxEvents)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let demuxer = Arc::new(MockDemuxer {
            script: self.script.clone(),
            events: tx,
            log: Mutex::new(DemuxLog::default()),
        });
        self.demuxers.lock().unwrap().push(demuxer.clone());
        Ok((demuxer, rx))
    }

    fn video(&self) -> Arc<dyn VideoElement> {
        self.video.clone()
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub orchestrator: PlaybackOrchestrator,
    pub view: RecordingView,
    pub backend: Arc<MockBackend>,
    pub fetcher: Arc<MockFetcher>,
}

pub fn harness(backend: MockBackend, fetcher: MockFetcher) -> Harness {
    let backend = Arc::new(backend);
    let fetcher = Arc::new(fetcher);
    let view = RecordingView::new();
    let orchestrator = PlaybackOrchestrator::new(
        PlayerConfig::default(),
        backend.clone(),
        fetcher.clone(),
        Box::new(view.clone()),
    )
    .expect("default config is valid");

    Harness { orchestrator, view, backend, fetcher }
}
