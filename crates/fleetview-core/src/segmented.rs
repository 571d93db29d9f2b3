//! Segmented MP4 Player
//!
//! Plays a complete MP4 file by demuxing it into fragmented segments and
//! appending them to a buffered media sink:
//!
//! 1. create the sink and wait for it to open
//! 2. fetch the whole file; non-2xx is a failure
//! 3. feed the bytes to the demuxer and flush
//! 4. on "ready", set the duration and create one sink buffer per track,
//!    walking the HEVC codec fallbacks for HEVC video tracks
//! 5. append segments through the per-track queues
//! 6. signal end-of-stream once every queue has drained
//!
//! The stage succeeds as soon as the sink reports a buffered range. Feeding
//! continues in the background after that, owned by the modal's pipeline.

use crate::{
    codec,
    config::PlayerConfig,
    media::{
        DemuxEvent, DemuxEvents, Demuxer, Fetcher, MediaBackend, MediaInfo, MediaSink, SinkEvent,
        SinkEvents, TrackInfo, TrackKind, BufferId,
    },
    queue::{Append, TrackQueues},
    session::{MediaPipeline, PlaybackSession},
    types::Stage,
    Error, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Samples per produced media segment
pub const SAMPLES_PER_SEGMENT: u32 = 1000;

/// Plays fetched MP4 files through a buffered media sink
pub struct SegmentedMp4Player {
    backend: Arc<dyn MediaBackend>,
    fetcher: Arc<dyn Fetcher>,
    budget: Duration,
    hevc_fallbacks: Arc<[String]>,
}

impl SegmentedMp4Player {
    pub fn new(backend: Arc<dyn MediaBackend>, fetcher: Arc<dyn Fetcher>, config: &PlayerConfig) -> Self {
        Self {
            backend,
            fetcher,
            budget: config.segmented_timeout(),
            hevc_fallbacks: config.hevc_fallback_codecs.clone().into(),
        }
    }

    /// Demuxer and sink are available on this host
    pub fn is_available(&self) -> bool {
        self.backend.supports_segmented()
    }

    /// Try to make `url` playable within the stage budget
    ///
    /// On failure the pipeline is torn down before returning.
    #[instrument(skip(self, session), fields(attempt = %session.attempt(), url = %url))]
    pub async fn play(&self, session: &PlaybackSession, url: &Url) -> Result<()> {
        let result = self.run(session, url).await;
        if let Err(ref e) = result {
            if !e.is_stale() {
                // Ignored when a newer attempt already owns the modal
                let _ = session.teardown_pipeline().await;
            }
        }
        result
    }

    async fn run(&self, session: &PlaybackSession, url: &Url) -> Result<()> {
        let (sink, sink_events) = self.backend.create_sink()?;
        let (demuxer, demux_events) = match self.backend.create_demuxer() {
            Ok(created) => created,
            Err(e) => {
                if let Err(close_err) = sink.close() {
                    debug!(error = %close_err, "Ignoring sink close failure");
                }
                return Err(e);
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let feeder = Feeder {
            session: session.clone(),
            sink: sink.clone(),
            demuxer: demuxer.clone(),
            fetcher: self.fetcher.clone(),
            url: url.clone(),
            hevc_fallbacks: self.hevc_fallbacks.clone(),
            queues: TrackQueues::new(),
            ready: Some(ready_tx),
        };
        let task = tokio::spawn(feeder.run(sink_events, demux_events));
        let pipeline = MediaPipeline::new(sink.clone(), demuxer)
            .with_feeder(task.abort_handle())
            .with_element(self.backend.video());
        session.install_pipeline(pipeline).await?;

        let verdict = tokio::select! {
            _ = session.superseded() => return Err(Error::StaleAttempt(session.attempt())),
            verdict = tokio::time::timeout(self.budget, ready_rx) => verdict,
        };

        match verdict {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Demux("feeder finished without anything playable".into())),
            Err(_) if sink.has_buffered() => {
                debug!("Stage budget elapsed with data buffered");
                Ok(())
            }
            Err(_) => Err(Error::StageTimeout {
                stage: Stage::SegmentedMp4,
                after_ms: self.budget.as_millis() as u64,
            }),
        }
    }
}

/// Background task pumping one file through the demuxer into the sink
struct Feeder {
    session: PlaybackSession,
    sink: Arc<dyn MediaSink>,
    demuxer: Arc<dyn Demuxer>,
    fetcher: Arc<dyn Fetcher>,
    url: Url,
    hevc_fallbacks: Arc<[String]>,
    queues: TrackQueues,
    ready: Option<oneshot::Sender<Result<()>>>,
}

impl Feeder {
    async fn run(mut self, mut sink_events: SinkEvents, mut demux_events: DemuxEvents) {
        match self.drive(&mut sink_events, &mut demux_events).await {
            Ok(()) => debug!(attempt = %self.session.attempt(), "Segment feed finished"),
            Err(e) if e.is_stale() => {
                debug!(attempt = %self.session.attempt(), "Dropping feed of superseded attempt")
            }
            Err(e) => self.report(Err(e)),
        }
        self.queues.clear();
    }

    async fn drive(&mut self, sink_events: &mut SinkEvents, demux_events: &mut DemuxEvents) -> Result<()> {
        let token = self.session.token().clone();

        self.wait_for_open(sink_events).await?;

        let data = tokio::select! {
            _ = token.superseded() => return Err(Error::StaleAttempt(token.id())),
            data = self.fetcher.fetch(&self.url) => data?,
        };
        token.ensure_current()?;
        debug!(bytes = data.len(), "Feeding demuxer");
        self.demuxer.append(data, 0)?;
        self.demuxer.flush();

        loop {
            tokio::select! {
                _ = token.superseded() => return Err(Error::StaleAttempt(token.id())),
                event = demux_events.recv() => {
                    token.ensure_current()?;
                    match event {
                        Some(event) => self.on_demux_event(event)?,
                        None => return Err(Error::Demux("demuxer went away".into())),
                    }
                }
                event = sink_events.recv() => {
                    token.ensure_current()?;
                    match event {
                        Some(event) => {
                            if self.on_sink_event(event)? {
                                return Ok(());
                            }
                        }
                        None => return Err(Error::Sink("sink went away".into())),
                    }
                }
            }
        }
    }

    async fn wait_for_open(&self, sink_events: &mut SinkEvents) -> Result<()> {
        let token = self.session.token();
        loop {
            let event = tokio::select! {
                _ = token.superseded() => return Err(Error::StaleAttempt(token.id())),
                event = sink_events.recv() => event,
            };
            token.ensure_current()?;
            match event {
                Some(SinkEvent::SourceOpen) => return Ok(()),
                Some(SinkEvent::Error(msg)) => return Err(Error::Sink(msg)),
                Some(SinkEvent::UpdateEnd(_)) => continue,
                None => return Err(Error::Sink("sink closed before opening".into())),
            }
        }
    }

    fn on_demux_event(&mut self, event: DemuxEvent) -> Result<()> {
        match event {
            DemuxEvent::Ready(info) => self.on_ready(&info),
            DemuxEvent::Segment { track_id, data, is_last } => {
                if let Some(append) = self.queues.push(track_id, data, is_last) {
                    self.issue(append)?;
                }
                Ok(())
            }
            DemuxEvent::Error(msg) => Err(Error::Demux(msg)),
        }
    }

    /// Returns true once end-of-stream has been signalled
    fn on_sink_event(&mut self, event: SinkEvent) -> Result<bool> {
        match event {
            SinkEvent::SourceOpen => Ok(false),
            SinkEvent::UpdateEnd(buffer) => {
                if let Some(append) = self.queues.complete(buffer) {
                    self.issue(append)?;
                }
                if self.ready.is_some() && self.sink.has_buffered() {
                    info!(attempt = %self.session.attempt(), "First data buffered");
                    self.report(Ok(()));
                }
                if self.queues.take_end_of_stream() {
                    if let Err(e) = self.sink.end_of_stream() {
                        debug!(error = %e, "Ignoring end-of-stream failure");
                    }
                    return Ok(true);
                }
                Ok(false)
            }
            SinkEvent::Error(msg) => Err(Error::Sink(msg)),
        }
    }

    fn on_ready(&mut self, info: &MediaInfo) -> Result<()> {
        info!(duration = info.duration, tracks = info.tracks.len(), "Demuxer ready");
        self.sink.set_duration(info.duration);

        for track in &info.tracks {
            if self.queues.contains(track.id) {
                continue;
            }
            match self.negotiate(track) {
                Some(buffer) => {
                    if !self.queues.insert(track.id, buffer) {
                        warn!(track = track.id, "Track table full, skipping track");
                        continue;
                    }
                    self.demuxer.configure_track(track.id, SAMPLES_PER_SEGMENT);
                }
                None if track.kind == TrackKind::Video && codec::is_hevc(&track.codec) => {
                    return Err(Error::CodecUnsupported {
                        track_id: track.id,
                        codec: track.codec.clone(),
                    });
                }
                None => warn!(track = track.id, codec = %track.codec, "No buffer for track, skipping"),
            }
        }

        if self.queues.is_empty() {
            return Err(Error::Demux("no playable tracks".into()));
        }

        for init in self.demuxer.initialize_segmentation()? {
            if let Some(append) = self.queues.push(init.track_id, init.data, false) {
                self.issue(append)?;
            }
        }
        self.demuxer.start();
        Ok(())
    }

    fn negotiate(&self, track: &TrackInfo) -> Option<BufferId> {
        for mime in codec::candidates(track, &self.hevc_fallbacks) {
            match self.sink.add_buffer(&mime) {
                Ok(buffer) => {
                    debug!(track = track.id, %mime, "Sink buffer created");
                    return Some(buffer);
                }
                Err(e) => debug!(track = track.id, %mime, error = %e, "Codec string rejected"),
            }
        }
        None
    }

    fn issue(&mut self, append: Append) -> Result<()> {
        self.sink.append(append.buffer, append.data)
    }

    fn report(&mut self, result: Result<()>) {
        match self.ready.take() {
            Some(ready) => {
                let _ = ready.send(result);
            }
            None => {
                if let Err(e) = result {
                    warn!(error = %e, "Segment feed failed after playback started");
                }
            }
        }
    }
}
