//! Codec-string negotiation
//!
//! A track's own codec string is always tried first. HEVC video tracks then
//! walk an ordered list of alternative strings, since browsers disagree on
//! which `hvc1`/`hev1` spellings they accept.

use crate::media::{TrackInfo, TrackKind};

/// Returns true for `hvc1`/`hev1` codec strings
pub fn is_hevc(codec: &str) -> bool {
    let lower = codec.trim().to_ascii_lowercase();
    lower.starts_with("hvc") || lower.starts_with("hev")
}

/// MIME type handed to the sink for one codec string
pub fn mime_for(kind: TrackKind, codec: &str) -> String {
    let container = match kind {
        TrackKind::Video => "video/mp4",
        TrackKind::Audio => "audio/mp4",
    };
    format!("{}; codecs=\"{}\"", container, codec)
}

/// Ordered MIME candidates for a track
pub fn candidates(track: &TrackInfo, hevc_fallbacks: &[String]) -> Vec<String> {
    let mut codecs = vec![track.codec.clone()];
    if track.kind == TrackKind::Video && is_hevc(&track.codec) {
        // Same profile string under the other sample-entry name
        let swapped = swap_sample_entry(&track.codec);
        for codec in swapped.into_iter().chain(hevc_fallbacks.iter().cloned()) {
            if !codecs.iter().any(|c| c.eq_ignore_ascii_case(&codec)) {
                codecs.push(codec);
            }
        }
    }

    codecs.iter().map(|codec| mime_for(track.kind, codec)).collect()
}

fn swap_sample_entry(codec: &str) -> Option<String> {
    let head = codec.get(..4)?;
    let rest = &codec[4..];
    match head.to_ascii_lowercase().as_str() {
        "hvc1" => Some(format!("hev1{}", rest)),
        "hev1" => Some(format!("hvc1{}", rest)),
        _ => None,
    }
}
