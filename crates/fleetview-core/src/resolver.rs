//! URL Resolver
//!
//! Turns a [`SourceDescriptor`] into the download-style backend URL of one
//! storage location:
//!
//! ```text
//! {scheme}://{host}:{port(location)}/3/5?DownType=3&jsession=..&DevIDNO=..&LOC=..
//!     &FLENGTH=0&FOFFSET=0&MTYPE=1&FPATH=..&SAVENAME=..&YEAR=..&MON=..&DAY=..
//!     &BEG=..&END=..&CHNMASK=..&FILEATTR=2
//! ```
//!
//! Output is a pure function of the descriptor, the location and the backend
//! configuration.

use crate::config::BackendConfig;
use crate::source::SourceDescriptor;
use crate::types::StorageLocation;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;
use url::{form_urlencoded, Url};

/// Path of the recording endpoint on every storage location
pub const RECORDING_PATH: &str = "/3/5";

/// Date used when the file path carries no `YYYY-MM-DD` component
pub const DEFAULT_FILE_DATE: (i32, u32, u32) = (2000, 1, 1);

/// Last second of a day, used when the input has no `FILEEND`
pub const END_OF_DAY_SECS: u64 = 86_399;

static FILE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("date regex should compile"));

/// A backend URL together with the location it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    pub location: StorageLocation,
    pub url: Url,
}

/// Builds backend URLs for storage locations
#[derive(Debug, Clone)]
pub struct UrlResolver {
    backend: BackendConfig,
}

impl UrlResolver {
    /// Create a resolver bound to a backend
    pub fn new(backend: BackendConfig) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Build the URL for one storage location
    ///
    /// Returns `None` when the device id or file path is missing.
    pub fn resolve(&self, source: &SourceDescriptor, location: StorageLocation) -> Option<Url> {
        let (Some(device_id), Some(file_path)) = (&source.device_id, &source.file_path) else {
            debug!(%location, "descriptor lacks DevIDNO or PLAYFILE");
            return None;
        };

        let date = recording_date(file_path);
        let query = [
            ("DownType", "3".to_string()),
            ("jsession", source.session.clone().unwrap_or_default()),
            ("DevIDNO", device_id.clone()),
            ("LOC", location.code().to_string()),
            ("FLENGTH", "0".to_string()),
            ("FOFFSET", "0".to_string()),
            ("MTYPE", "1".to_string()),
            ("FPATH", file_path.clone()),
            ("SAVENAME", save_name(file_path).to_string()),
            ("YEAR", format!("{:04}", date.year())),
            ("MON", format!("{:02}", date.month())),
            ("DAY", format!("{:02}", date.day())),
            ("BEG", source.begin_secs.unwrap_or(0).to_string()),
            ("END", source.end_secs.unwrap_or(END_OF_DAY_SECS).to_string()),
            ("CHNMASK", channel_mask(source.channel).to_string()),
            ("FILEATTR", "2".to_string()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");

        let raw = format!("{}{}?{}", self.backend.origin(location), RECORDING_PATH, query);
        match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(err) => {
                debug!(%location, error = %err, "backend URL did not parse");
                None
            }
        }
    }

    /// First location in preference order that yields a URL
    pub fn resolve_preferred(&self, source: &SourceDescriptor) -> Option<ResolvedUrl> {
        StorageLocation::PREFERENCE.iter().find_map(|&location| {
            self.resolve(source, location)
                .map(|url| ResolvedUrl { location, url })
        })
    }

    /// URLs for every location that resolves, in preference order
    pub fn resolve_all(&self, source: &SourceDescriptor) -> Vec<ResolvedUrl> {
        StorageLocation::PREFERENCE
            .iter()
            .filter_map(|&location| {
                self.resolve(source, location)
                    .map(|url| ResolvedUrl { location, url })
            })
            .collect()
    }
}

/// Recording date embedded in a file path, or [`DEFAULT_FILE_DATE`]
pub fn recording_date(file_path: &str) -> NaiveDate {
    let fallback = || {
        let (y, m, d) = DEFAULT_FILE_DATE;
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    };

    FILE_DATE
        .captures(file_path)
        .and_then(|c| {
            let year = c[1].parse().ok()?;
            let month = c[2].parse().ok()?;
            let day = c[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .unwrap_or_else(fallback)
}

/// Percent-encode one query value, spaces included
///
/// `byte_serialize` escapes a literal `+` as `%2B`, so every `+` left in its
/// output stands for a space.
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// File name part of a device path
pub fn save_name(file_path: &str) -> &str {
    file_path
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(file_path)
}

/// Channel bit mask; channels outside 0..=31 map to channel 0
pub fn channel_mask(channel: Option<u32>) -> u32 {
    match channel {
        Some(c) if c < 32 => 1 << c,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(url: &str) -> SourceDescriptor {
        SourceDescriptor::parse(url, &BackendConfig::default())
    }

    const PLAYBACK: &str = "http://10.0.0.5:6604/3/5?DownType=5&DevIDNO=50012&FILECHN=2\
        &FILEBEG=3600&FILEEND=3900&PLAYFILE=%2Fmnt%2Fhd1%2F2024-05-12%2Fch1%20a.mp4&jsession=abc123";

    #[test]
    fn test_resolve_download_url() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let url = resolver.resolve(&descriptor(PLAYBACK), StorageLocation::Download).unwrap();

        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:6609/3/5?DownType=3&jsession=abc123&DevIDNO=50012&LOC=4\
             &FLENGTH=0&FOFFSET=0&MTYPE=1&FPATH=%2Fmnt%2Fhd1%2F2024-05-12%2Fch1%20a.mp4\
             &SAVENAME=ch1%20a.mp4&YEAR=2024&MON=05&DAY=12&BEG=3600&END=3900&CHNMASK=4&FILEATTR=2"
        );
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let source = descriptor(PLAYBACK);
        for location in StorageLocation::PREFERENCE {
            let first = resolver.resolve(&source, location).unwrap();
            let second = resolver.resolve(&source, location).unwrap();
            assert_eq!(first.as_str(), second.as_str());
        }
    }

    #[test]
    fn test_locations_bind_their_ports() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let source = descriptor(PLAYBACK);
        let ports: Vec<_> = resolver
            .resolve_all(&source)
            .iter()
            .map(|r| (r.location, r.url.port()))
            .collect();
        assert_eq!(
            ports,
            vec![
                (StorageLocation::Download, Some(6609)),
                (StorageLocation::Storage, Some(6611)),
                (StorageLocation::Device, Some(6604)),
            ]
        );
    }

    #[test]
    fn test_preferred_is_download() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let resolved = resolver.resolve_preferred(&descriptor(PLAYBACK)).unwrap();
        assert_eq!(resolved.location, StorageLocation::Download);
    }

    #[test]
    fn test_missing_fields_resolve_nothing() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let no_file = descriptor("http://h:6604/3/5?DevIDNO=1&jsession=s");
        let no_device = descriptor("http://h:6604/3/5?PLAYFILE=a.mp4&jsession=s");
        for location in StorageLocation::PREFERENCE {
            assert!(resolver.resolve(&no_file, location).is_none());
            assert!(resolver.resolve(&no_device, location).is_none());
        }
        assert!(resolver.resolve_preferred(&no_file).is_none());
        assert!(resolver.resolve_all(&no_device).is_empty());
    }

    #[test]
    fn test_pattern_extraction_resolves_identically() {
        let resolver = UrlResolver::new(BackendConfig::default());
        let broken = PLAYBACK.replace("10.0.0.5:6604", "[10.0.0.5:6604");
        assert_eq!(
            resolver.resolve(&descriptor(&broken), StorageLocation::Storage),
            resolver.resolve(&descriptor(PLAYBACK), StorageLocation::Storage),
        );
    }

    #[test]
    fn test_recording_date() {
        assert_eq!(recording_date("/a/2023-11-30/x.mp4"), NaiveDate::from_ymd_opt(2023, 11, 30).unwrap());
        assert_eq!(recording_date("/a/2023-13-45/x.mp4"), NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(recording_date("x.mp4"), NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn test_encode_component_spaces_and_plus() {
        assert_eq!(encode_component("ch1 a.mp4"), "ch1%20a.mp4");
        assert_eq!(encode_component("a+b"), "a%2Bb");
        assert_eq!(encode_component("/mnt/hd1"), "%2Fmnt%2Fhd1");
    }

    #[test]
    fn test_save_name_and_mask() {
        assert_eq!(save_name("/mnt/hd1/ch1.mp4"), "ch1.mp4");
        assert_eq!(save_name(r"D:\rec\ch2.mp4"), "ch2.mp4");
        assert_eq!(save_name("plain.mp4"), "plain.mp4");
        assert_eq!(channel_mask(None), 1);
        assert_eq!(channel_mask(Some(3)), 8);
        assert_eq!(channel_mask(Some(40)), 1);
    }
}
