//! Error Presenter
//!
//! Two mutually exclusive terminal panels replace the video element: a
//! generic one pointing at the manual download actions, and an HEVC one
//! telling the user to download the file and use an external player.

use crate::view::PlayerView;
use serde::{Deserialize, Serialize};

/// Which terminal panel is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelKind {
    Generic,
    HevcUnsupported,
}

/// Text of an error panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPanel {
    pub kind: PanelKind,
    pub message: String,
    pub hint: String,
}

pub const CANNOT_BUILD_URL: &str = "Cannot build video URL";
pub const CANNOT_BUILD_DOWNLOAD_URL: &str = "Cannot build download URL";
pub const GENERIC_HINT: &str = "Use the download buttons above to save the recording.";
pub const HEVC_MESSAGE: &str = "This browser cannot decode H.265/HEVC video.";
pub const HEVC_HINT: &str =
    "Download the recording and open it with an external player such as VLC.";

impl ErrorPanel {
    /// Generic failure with a short message
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: PanelKind::Generic,
            message: message.into(),
            hint: GENERIC_HINT.to_string(),
        }
    }

    /// Browser cannot decode HEVC
    pub fn hevc_unsupported() -> Self {
        Self {
            kind: PanelKind::HevcUnsupported,
            message: HEVC_MESSAGE.to_string(),
            hint: HEVC_HINT.to_string(),
        }
    }
}

/// Renders terminal error panels
pub struct ErrorPresenter;

impl ErrorPresenter {
    /// Hide the loading indicator and replace the video with the panel
    pub fn present(view: &mut dyn PlayerView, panel: &ErrorPanel) {
        view.set_loading(false);
        view.show_error(panel);
    }
}
