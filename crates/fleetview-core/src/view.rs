//! Modal UI surface
//!
//! The orchestrator mutates the page only through [`PlayerView`].

use crate::presenter::ErrorPanel;
use std::sync::{Arc, Mutex};

/// Page elements of the playback modal
pub trait PlayerView: Send {
    /// Show the modal with a title
    fn open_modal(&mut self, title: &str);

    /// Hide the modal
    fn close_modal(&mut self);

    /// Toggle the loading indicator
    fn set_loading(&mut self, visible: bool);

    /// Show the video element and hide any error panel
    fn show_video(&mut self);

    /// Replace the video element with an error panel
    fn show_error(&mut self, panel: &ErrorPanel);

    /// Open a URL in a new browsing context
    fn open_external(&mut self, url: &str);

    /// Short blocking notice
    fn alert(&mut self, message: &str);
}

/// Mutation recorded by [`RecordingView`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Opened(String),
    Closed,
    Loading(bool),
    VideoShown,
    Error(ErrorPanel),
    External(String),
    Alert(String),
}

/// View that records every mutation; clones share one log
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    log: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded mutations
    pub fn events(&self) -> Vec<ViewEvent> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of recorded mutations
    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, event: ViewEvent) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

impl PlayerView for RecordingView {
    fn open_modal(&mut self, title: &str) {
        self.record(ViewEvent::Opened(title.to_string()));
    }

    fn close_modal(&mut self) {
        self.record(ViewEvent::Closed);
    }

    fn set_loading(&mut self, visible: bool) {
        self.record(ViewEvent::Loading(visible));
    }

    fn show_video(&mut self) {
        self.record(ViewEvent::VideoShown);
    }

    fn show_error(&mut self, panel: &ErrorPanel) {
        self.record(ViewEvent::Error(panel.clone()));
    }

    fn open_external(&mut self, url: &str) {
        self.record(ViewEvent::External(url.to_string()));
    }

    fn alert(&mut self, message: &str) {
        self.record(ViewEvent::Alert(message.to_string()));
    }
}
