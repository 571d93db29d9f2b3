//! Native Fallback Player
//!
//! Hands the URL straight to the video element and waits for whichever comes
//! first: `canplay`, `error`, or the stage budget. The listener is detached as
//! soon as one of them wins. The element is registered as the modal's
//! pipeline, so closing the modal pauses and unloads it.

use crate::{
    config::PlayerConfig,
    media::{ElementEvent, MediaBackend},
    session::{MediaPipeline, PlaybackSession},
    types::Stage,
    Error, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Plays a URL through the element's own decoder
pub struct NativeFallbackPlayer {
    backend: Arc<dyn MediaBackend>,
    budget: Duration,
}

impl NativeFallbackPlayer {
    pub fn new(backend: Arc<dyn MediaBackend>, config: &PlayerConfig) -> Self {
        Self {
            backend,
            budget: config.native_timeout(),
        }
    }

    /// Wait for the element to become playable
    ///
    /// A timeout still counts as success when the element already holds the
    /// current frame.
    #[instrument(skip(self, session), fields(attempt = %session.attempt(), url = %url))]
    pub async fn play(&self, session: &PlaybackSession, url: &Url) -> Result<()> {
        let video = self.backend.video();
        let (listener, mut events) = video.subscribe();

        let assigned = session
            .update(|modal| {
                modal.install_pipeline(MediaPipeline::native(video.clone()));
                video.set_source(url.as_str());
            })
            .await;
        if let Err(e) = assigned {
            video.unsubscribe(listener);
            return Err(e);
        }

        let verdict = tokio::select! {
            _ = session.superseded() => Err(Error::StaleAttempt(session.attempt())),
            event = events.recv() => match event {
                Some(ElementEvent::CanPlay) => Ok(()),
                Some(ElementEvent::Error(msg)) => Err(Error::NativePlayback(msg)),
                None => Err(Error::NativePlayback("video element dropped the listener".into())),
            },
            _ = tokio::time::sleep(self.budget) => {
                if video.has_current_data() {
                    Ok(())
                } else {
                    Err(Error::StageTimeout {
                        stage: Stage::Native,
                        after_ms: self.budget.as_millis() as u64,
                    })
                }
            }
        };

        video.unsubscribe(listener);
        debug!(ok = verdict.is_ok(), "Native stage settled");
        verdict
    }
}
