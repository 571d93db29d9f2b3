//! Playback Orchestrator - main entry point of the playback modal
//!
//! Coordinates:
//! - Attempt ids and supersession
//! - URL resolution
//! - Segmented MP4 then native playback, each with its own budget
//! - Error panels and manual download actions
//!
//! ```text
//! Idle -> ResolvingUrl -> TryingSegmentedMp4 -> TryingNative -> Succeeded | Failed
//!              |                  |                                 ^
//!              |                  +-- HEVC rejected ----------------+ Failed
//!              +-- no URL / no segmented capability ---------------+
//! ```

use crate::{
    attempt::{AttemptId, AttemptTracker},
    config::PlayerConfig,
    error::ErrorKind,
    media::{Fetcher, MediaBackend},
    native::NativeFallbackPlayer,
    presenter::{ErrorPanel, ErrorPresenter, CANNOT_BUILD_DOWNLOAD_URL, CANNOT_BUILD_URL},
    resolver::{ResolvedUrl, UrlResolver},
    segmented::SegmentedMp4Player,
    session::{ModalState, PlaybackSession, SharedModal},
    source::SourceDescriptor,
    types::{PlaybackOutcome, PlaybackState, Stage, StorageLocation},
    view::PlayerView,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Handle of a started attempt
#[derive(Debug)]
pub struct PlaybackHandle {
    attempt: AttemptId,
    task: JoinHandle<PlaybackOutcome>,
}

impl PlaybackHandle {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Wait for the attempt to settle
    pub async fn outcome(self) -> PlaybackOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                error!(attempt = %self.attempt, error = %e, "Attempt task panicked");
                PlaybackOutcome::Crashed { reason: e.to_string() }
            }
            Err(e) => {
                warn!(attempt = %self.attempt, error = %e, "Attempt task cancelled");
                PlaybackOutcome::Superseded
            }
        }
    }
}

struct Inner {
    resolver: UrlResolver,
    segmented: SegmentedMp4Player,
    native: NativeFallbackPlayer,
    backend: Arc<dyn MediaBackend>,
    attempts: AttemptTracker,
    modal: SharedModal,
    state_rx: watch::Receiver<PlaybackState>,
}

/// Drives the playback modal
#[derive(Clone)]
pub struct PlaybackOrchestrator {
    inner: Arc<Inner>,
}

impl PlaybackOrchestrator {
    /// Create an orchestrator over a host backend and view
    pub fn new(
        config: PlayerConfig,
        backend: Arc<dyn MediaBackend>,
        fetcher: Arc<dyn Fetcher>,
        view: Box<dyn PlayerView>,
    ) -> Result<Self> {
        config.validate()?;

        let modal = ModalState::new(view);
        let state_rx = modal.subscribe();

        Ok(Self {
            inner: Arc::new(Inner {
                resolver: UrlResolver::new(config.backend.clone()),
                segmented: SegmentedMp4Player::new(backend.clone(), fetcher, &config),
                native: NativeFallbackPlayer::new(backend.clone(), &config),
                backend,
                attempts: AttemptTracker::new(),
                modal: Arc::new(Mutex::new(modal)),
                state_rx,
            }),
        })
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_rx.clone()
    }

    /// Most recently allocated attempt id
    pub fn current_attempt(&self) -> AttemptId {
        self.inner.attempts.current()
    }

    /// Source of the open modal
    pub async fn source(&self) -> Option<SourceDescriptor> {
        self.inner.modal.lock().await.source().cloned()
    }

    /// Open the modal and start playing `raw_url`
    ///
    /// Supersedes any attempt in flight and tears its pipeline down.
    #[instrument(skip(self))]
    pub async fn open(&self, raw_url: &str, title: &str) -> PlaybackHandle {
        let source = SourceDescriptor::parse(raw_url, self.inner.resolver.backend());

        let session = {
            let mut modal = self.inner.modal.lock().await;
            let token = self.inner.attempts.begin();
            modal.teardown_pipeline();
            modal.set_source(Some(source.clone()));
            if let Err(e) = modal.set_state(PlaybackState::ResolvingUrl) {
                warn!(error = %e, "Unexpected state on open");
            }
            let view = modal.view_mut();
            view.open_modal(title);
            view.set_loading(true);
            PlaybackSession::new(token, self.inner.modal.clone())
        };

        let attempt = session.attempt();
        info!(%attempt, extraction = ?source.extraction, "Playback attempt started");

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_attempt(session, source).await });
        PlaybackHandle { attempt, task }
    }

    /// Close the modal
    ///
    /// Supersedes the current attempt, releases its pipeline and clears the
    /// stored source.
    pub async fn close(&self) {
        let mut modal = self.inner.modal.lock().await;
        let closed = self.inner.attempts.invalidate();
        modal.teardown_pipeline();
        modal.set_source(None);
        if let Err(e) = modal.set_state(PlaybackState::Idle) {
            warn!(error = %e, "Unexpected state on close");
        }
        let view = modal.view_mut();
        view.set_loading(false);
        view.close_modal();
        debug!(%closed, "Modal closed");
    }

    /// Open the device copy of the current recording in a new context
    pub async fn open_device_url(&self) -> Result<Url> {
        self.open_location(StorageLocation::Device).await
    }

    /// Open the storage-server copy of the current recording in a new context
    pub async fn open_storage_url(&self) -> Result<Url> {
        self.open_location(StorageLocation::Storage).await
    }

    /// Open the download-server copy of the current recording in a new context
    pub async fn open_download_url(&self) -> Result<Url> {
        self.open_location(StorageLocation::Download).await
    }

    async fn open_location(&self, location: StorageLocation) -> Result<Url> {
        let mut modal = self.inner.modal.lock().await;
        let url = modal
            .source()
            .and_then(|source| self.inner.resolver.resolve(source, location));

        match url {
            Some(url) => {
                info!(%location, url = %url, "Opening download URL");
                modal.view_mut().open_external(url.as_str());
                Ok(url)
            }
            None => {
                modal.view_mut().alert(CANNOT_BUILD_DOWNLOAD_URL);
                Err(Error::resolution(format!("{} ({})", CANNOT_BUILD_DOWNLOAD_URL, location)))
            }
        }
    }
}

impl Inner {
    async fn run_attempt(&self, session: PlaybackSession, source: SourceDescriptor) -> PlaybackOutcome {
        let Some(resolved) = self.resolver.resolve_preferred(&source) else {
            let err = Error::resolution("recording has no device id or file path");
            return self.fail(&session, err, ErrorPanel::generic(CANNOT_BUILD_URL)).await;
        };

        let ResolvedUrl { location, url } = resolved;
        info!(attempt = %session.attempt(), %location, url = %url, "Backend URL resolved");

        if self.segmented.is_available() {
            if let Err(e) = session.transition(PlaybackState::TryingSegmentedMp4).await {
                return self.abandon(&session, e).await;
            }

            match self.segmented.play(&session, &url).await {
                Ok(()) => return self.succeed(&session, Stage::SegmentedMp4).await,
                Err(e) if e.is_stale() => return PlaybackOutcome::Superseded,
                Err(e) if e.kind() == ErrorKind::CodecUnsupported => {
                    warn!(error = %e, "HEVC rejected by the sink, skipping native playback");
                    return self.fail(&session, e, ErrorPanel::hevc_unsupported()).await;
                }
                Err(e) if e.escalates() => {
                    warn!(error = %e, "Segmented playback failed, falling back to native");
                }
                Err(e) => return self.abandon(&session, e).await,
            }
        } else {
            debug!("Segmented playback unavailable, using native element");
        }

        if let Err(e) = session.transition(PlaybackState::TryingNative).await {
            return self.abandon(&session, e).await;
        }

        match self.native.play(&session, &url).await {
            Ok(()) => self.succeed(&session, Stage::Native).await,
            Err(e) if e.is_stale() => PlaybackOutcome::Superseded,
            // Reaching here means the segmented path already failed or was
            // unavailable, so the element failing is reported as a codec problem
            Err(e) => self.fail(&session, e, ErrorPanel::hevc_unsupported()).await,
        }
    }

    async fn succeed(&self, session: &PlaybackSession, stage: Stage) -> PlaybackOutcome {
        let shown = session
            .update(|modal| {
                modal.set_state(PlaybackState::Succeeded)?;
                let view = modal.view_mut();
                view.set_loading(false);
                view.show_video();
                Ok::<_, Error>(())
            })
            .await;

        match shown {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.abandon(session, e).await,
            Err(_) => return PlaybackOutcome::Superseded,
        }

        info!(attempt = %session.attempt(), %stage, "Playback ready");
        if session.is_current() {
            if let Err(e) = self.backend.video().play().await {
                debug!(error = %e, "Autoplay refused");
            }
        }
        PlaybackOutcome::Playing { stage }
    }

    async fn fail(&self, session: &PlaybackSession, error: Error, panel: ErrorPanel) -> PlaybackOutcome {
        let shown = session
            .update(|modal| {
                modal.teardown_pipeline();
                if let Err(e) = modal.set_state(PlaybackState::Failed) {
                    warn!(error = %e, "Unexpected state on failure");
                }
                ErrorPresenter::present(modal.view_mut(), &panel);
            })
            .await;

        if shown.is_err() {
            return PlaybackOutcome::Superseded;
        }

        warn!(attempt = %session.attempt(), code = error.error_code(), error = %error, "Playback failed");
        PlaybackOutcome::Failed {
            panel: panel.kind,
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    /// Unexpected internal error: show the generic panel
    async fn abandon(&self, session: &PlaybackSession, error: Error) -> PlaybackOutcome {
        if error.is_stale() {
            return PlaybackOutcome::Superseded;
        }
        let panel = ErrorPanel::generic(error.to_string());
        self.fail(session, error, panel).await
    }
}
