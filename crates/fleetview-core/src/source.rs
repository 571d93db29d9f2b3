//! Source descriptors
//!
//! A [`SourceDescriptor`] is built once per playback attempt from the URL the
//! caller handed to the modal. Fields are read from the parsed query string
//! first. When the string does not parse as a URL, each field is recovered by
//! its own pattern extractor instead, so both paths produce the same values for
//! equivalent input.

use crate::config::BackendConfig;
use crate::types::{StorageLocation, StreamKind};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;
use url::{form_urlencoded, Url};

/// How the descriptor fields were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Extraction {
    /// Parsed as a URL and read from its query pairs
    Structured,
    /// Recovered field by field with pattern matching
    Pattern,
}

/// Immutable description of the recording an attempt plays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    /// URL as handed to the modal
    pub raw: String,
    /// URL after wrapper unwrapping and scheme normalization
    pub normalized: String,
    /// `jsession`
    pub session: Option<String>,
    /// `DevIDNO`
    pub device_id: Option<String>,
    /// `PLAYFILE`
    pub file_path: Option<String>,
    /// `FILEBEG` in seconds of day
    pub begin_secs: Option<u64>,
    /// `FILEEND` in seconds of day
    pub end_secs: Option<u64>,
    /// `FILECHN`
    pub channel: Option<u32>,
    /// `FILELOC`, when the input names one
    pub location: Option<StorageLocation>,
    /// Stream endpoint recognised from the path
    pub stream: Option<StreamKind>,
    pub extraction: Extraction,
}

#[derive(Debug, Default)]
struct Fields {
    session: Option<String>,
    device_id: Option<String>,
    file_path: Option<String>,
    begin_secs: Option<u64>,
    end_secs: Option<u64>,
    channel: Option<u32>,
    location: Option<StorageLocation>,
}

impl SourceDescriptor {
    /// Build a descriptor from a raw player URL
    ///
    /// Never fails: fields that cannot be recovered are left empty and the
    /// resolver decides whether the descriptor is usable.
    pub fn parse(raw: &str, backend: &BackendConfig) -> Self {
        let normalized = normalize_scheme(&unwrap_player_url(raw));
        let stream = StreamKind::from_path(normalized.split(['?', '#']).next().unwrap_or(""));

        let (fields, extraction) = match parse_structured(&normalized, backend) {
            Some(url) => (structured_fields(&url), Extraction::Structured),
            None => {
                debug!(url = %normalized, "URL did not parse, extracting fields by pattern");
                (pattern_fields(&normalized), Extraction::Pattern)
            }
        };

        Self {
            raw: raw.to_string(),
            normalized,
            session: fields.session,
            device_id: fields.device_id,
            file_path: fields.file_path,
            begin_secs: fields.begin_secs,
            end_secs: fields.end_secs,
            channel: fields.channel,
            location: fields.location,
            stream,
            extraction,
        }
    }

    /// Returns true if the fields required to build a backend URL are present
    pub fn is_resolvable(&self) -> bool {
        self.device_id.is_some() && self.file_path.is_some()
    }
}

// =============================================================================
// Unwrapping and normalization
// =============================================================================

static WRAPPED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]url=([^&#]+)").expect("wrapper regex should compile"));

/// Replace a player-wrapper URL with the video URL embedded in its `url` parameter
///
/// A value that does not decode cleanly leaves the raw URL in place.
pub fn unwrap_player_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(encoded) = WRAPPED_URL.captures(trimmed).and_then(|c| c.get(1)) else {
        return trimmed.to_string();
    };

    match decode_strict(encoded.as_str()) {
        Some(inner) if !inner.trim().is_empty() => inner.trim().to_string(),
        _ => {
            debug!(url = %trimmed, "embedded url parameter did not decode, using raw URL");
            trimmed.to_string()
        }
    }
}

/// Rewrite `ws`/`wss` schemes to `http`/`https`
pub fn normalize_scheme(url: &str) -> String {
    let lower = url.get(..6).map(str::to_ascii_lowercase).unwrap_or_default();
    if lower.starts_with("wss://") {
        format!("https://{}", &url[6..])
    } else if lower.starts_with("ws://") {
        format!("http://{}", &url[5..])
    } else {
        url.to_string()
    }
}

fn parse_structured(normalized: &str, backend: &BackendConfig) -> Option<Url> {
    match Url::parse(normalized) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            // Relative stream paths are bound to the device gateway
            let path = normalized.split(['?', '#']).next().unwrap_or("");
            if !normalized.starts_with('/') || StreamKind::from_path(path).is_none() {
                return None;
            }
            let base = Url::parse(&backend.origin(StorageLocation::Device)).ok()?;
            base.join(normalized).ok()
        }
        Err(_) => None,
    }
}

fn structured_fields(url: &Url) -> Fields {
    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    Fields {
        session: param("jsession"),
        device_id: param("DevIDNO"),
        file_path: param("PLAYFILE"),
        begin_secs: param("FILEBEG").and_then(|v| v.parse().ok()),
        end_secs: param("FILEEND").and_then(|v| v.parse().ok()),
        channel: param("FILECHN").and_then(|v| v.parse().ok()),
        location: param("FILELOC").and_then(|v| location_from_code(&v)),
    }
}

fn pattern_fields(text: &str) -> Fields {
    Fields {
        session: extract_session(text),
        device_id: extract_device_id(text),
        file_path: extract_play_file(text),
        begin_secs: extract_file_begin(text),
        end_secs: extract_file_end(text),
        channel: extract_channel(text),
        location: extract_param(&FILE_LOC, text).and_then(|v| location_from_code(&v)),
    }
}

fn location_from_code(code: &str) -> Option<StorageLocation> {
    match code {
        "1" => Some(StorageLocation::Device),
        "2" => Some(StorageLocation::Storage),
        "4" => Some(StorageLocation::Download),
        _ => None,
    }
}

// =============================================================================
// Pattern extractors
// =============================================================================

macro_rules! param_pattern {
    ($name:ident, $key:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(concat!(r"(?:^|[?&])", $key, r"=([^&#]*)"))
                .expect("parameter regex should compile")
        });
    };
}

param_pattern!(SESSION, "jsession");
param_pattern!(DEVICE_ID, "DevIDNO");
param_pattern!(PLAY_FILE, "PLAYFILE");
param_pattern!(FILE_BEGIN, "FILEBEG");
param_pattern!(FILE_END, "FILEEND");
param_pattern!(FILE_CHANNEL, "FILECHN");
param_pattern!(FILE_LOC, "FILELOC");

fn extract_param(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| decode_component(m.as_str()))
        .filter(|v| !v.is_empty())
}

/// `jsession` recovered by pattern
pub fn extract_session(text: &str) -> Option<String> {
    extract_param(&SESSION, text)
}

/// `DevIDNO` recovered by pattern
pub fn extract_device_id(text: &str) -> Option<String> {
    extract_param(&DEVICE_ID, text)
}

/// `PLAYFILE` recovered by pattern
pub fn extract_play_file(text: &str) -> Option<String> {
    extract_param(&PLAY_FILE, text)
}

/// `FILEBEG` recovered by pattern
pub fn extract_file_begin(text: &str) -> Option<u64> {
    extract_param(&FILE_BEGIN, text).and_then(|v| v.parse().ok())
}

/// `FILEEND` recovered by pattern
pub fn extract_file_end(text: &str) -> Option<u64> {
    extract_param(&FILE_END, text).and_then(|v| v.parse().ok())
}

/// `FILECHN` recovered by pattern
pub fn extract_channel(text: &str) -> Option<u32> {
    extract_param(&FILE_CHANNEL, text).and_then(|v| v.parse().ok())
}

/// Decode one query component the same way `Url::query_pairs` does
pub fn decode_component(value: &str) -> String {
    form_urlencoded::parse(format!("v={}", value).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn decode_strict(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    });
    if malformed {
        return None;
    }

    let decoded = decode_component(value);
    (!decoded.contains('\u{FFFD}')).then_some(decoded)
}
