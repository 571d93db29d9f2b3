//! Playback Session - per-attempt access to the modal
//!
//! The modal state (view, orchestrator state, stored source, live media
//! pipeline) sits behind one lock. A [`PlaybackSession`] pairs that lock with
//! an attempt token; every mutation it performs re-checks the token while the
//! lock is held, so a superseded attempt can never touch the page.

use crate::{
    attempt::{AttemptId, AttemptToken},
    media::{Demuxer, MediaSink, VideoElement},
    source::SourceDescriptor,
    types::PlaybackState,
    view::PlayerView,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Live decode resources of one attempt
///
/// Teardown releases each resource at most once; further calls are no-ops.
#[derive(Default)]
pub struct MediaPipeline {
    sink: Option<Arc<dyn MediaSink>>,
    demuxer: Option<Arc<dyn Demuxer>>,
    feeder: Option<AbortHandle>,
    element: Option<Arc<dyn VideoElement>>,
}

impl MediaPipeline {
    /// Pipeline owning a sink and the demuxer feeding it
    pub fn new(sink: Arc<dyn MediaSink>, demuxer: Arc<dyn Demuxer>) -> Self {
        Self {
            sink: Some(sink),
            demuxer: Some(demuxer),
            ..Self::default()
        }
    }

    /// Pipeline of the native stage: only the element is held
    pub fn native(element: Arc<dyn VideoElement>) -> Self {
        Self::default().with_element(element)
    }

    /// Attach the task pumping segments into the sink
    pub fn with_feeder(mut self, feeder: AbortHandle) -> Self {
        self.feeder = Some(feeder);
        self
    }

    /// Attach the video element the pipeline renders into
    pub fn with_element(mut self, element: Arc<dyn VideoElement>) -> Self {
        self.element = Some(element);
        self
    }

    /// Returns true while any resource is held
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
            || self.demuxer.is_some()
            || self.feeder.is_some()
            || self.element.is_some()
    }

    /// Stop the feeder and demuxer, pause the element, close the sink, then
    /// detach the element from its source
    ///
    /// Errors are logged and swallowed.
    pub fn teardown(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        if let Some(demuxer) = self.demuxer.take() {
            demuxer.stop();
        }
        let element = self.element.take();
        if let Some(element) = &element {
            element.pause();
        }
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                debug!(error = %e, "Ignoring sink close failure");
            }
        }
        if let Some(element) = element {
            element.clear_source();
        }
    }
}

impl std::fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("sink", &self.sink.is_some())
            .field("demuxer", &self.demuxer.is_some())
            .field("feeder", &self.feeder.is_some())
            .field("element", &self.element.is_some())
            .finish()
    }
}

/// Everything the orchestrator owns for the open modal
pub struct ModalState {
    view: Box<dyn PlayerView>,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    source: Option<SourceDescriptor>,
    pipeline: MediaPipeline,
}

impl ModalState {
    pub fn new(view: Box<dyn PlayerView>) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            view,
            state: PlaybackState::Idle,
            state_tx,
            source: None,
            pipeline: MediaPipeline::default(),
        }
    }

    /// Current orchestrator state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Transition to a new state
    pub fn set_state(&mut self, new_state: PlaybackState) -> Result<()> {
        let current = self.state;
        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        self.state_tx.send_replace(new_state);
        info!(from = %current, to = %new_state, "State transition");
        Ok(())
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<SourceDescriptor>) {
        self.source = source;
    }

    pub fn view_mut(&mut self) -> &mut dyn PlayerView {
        self.view.as_mut()
    }

    /// Replace the pipeline, tearing the previous one down first
    pub fn install_pipeline(&mut self, pipeline: MediaPipeline) {
        self.pipeline.teardown();
        self.pipeline = pipeline;
    }

    pub fn teardown_pipeline(&mut self) {
        self.pipeline.teardown();
    }
}

/// Modal state shared between the orchestrator and its attempts
pub type SharedModal = Arc<Mutex<ModalState>>;

/// One attempt's guarded handle on the modal
#[derive(Clone)]
pub struct PlaybackSession {
    token: AttemptToken,
    modal: SharedModal,
}

impl PlaybackSession {
    pub fn new(token: AttemptToken, modal: SharedModal) -> Self {
        Self { token, modal }
    }

    pub fn attempt(&self) -> AttemptId {
        self.token.id()
    }

    pub fn token(&self) -> &AttemptToken {
        &self.token
    }

    pub fn is_current(&self) -> bool {
        self.token.is_current()
    }

    /// `Err(StaleAttempt)` once superseded
    pub fn ensure_current(&self) -> Result<()> {
        self.token.ensure_current()
    }

    /// Resolves once this attempt is superseded
    pub async fn superseded(&self) {
        self.token.superseded().await
    }

    /// Run `f` on the modal if this attempt is still current
    pub async fn update<R>(&self, f: impl FnOnce(&mut ModalState) -> R) -> Result<R> {
        let mut modal = self.modal.lock().await;
        self.token.ensure_current()?;
        Ok(f(&mut modal))
    }

    /// Guarded state transition
    pub async fn transition(&self, to: PlaybackState) -> Result<()> {
        self.update(|modal| modal.set_state(to)).await?
    }

    /// Hand a pipeline to the modal; a stale attempt releases it instead
    ///
    /// The element belongs to whichever attempt is current, so a stale
    /// pipeline is released without touching it.
    pub async fn install_pipeline(&self, mut pipeline: MediaPipeline) -> Result<()> {
        let mut modal = self.modal.lock().await;
        if let Err(e) = self.token.ensure_current() {
            pipeline.element = None;
            pipeline.teardown();
            return Err(e);
        }
        modal.install_pipeline(pipeline);
        Ok(())
    }

    /// Tear down the modal's pipeline if this attempt still owns it
    pub async fn teardown_pipeline(&self) -> Result<()> {
        self.update(|modal| modal.teardown_pipeline()).await
    }
}
