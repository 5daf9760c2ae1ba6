pub mod engine;
pub mod library;
pub mod playlist;
pub mod playlist_file;
pub mod probe;
#[cfg(feature = "audio")]
pub mod rodio_engine;
pub mod scanner;
pub mod session;
pub mod track;

pub use engine::{EngineError, EngineEvent, EngineEventKind, MediaEngine};
pub use library::{LibraryIndex, LibraryView};
pub use playlist::{Advance, PlayOrder, PlaylistEngine, RepeatMode, Retreat, RESTART_THRESHOLD_MS};
pub use playlist_file::PlaylistFormat;
pub use probe::{FileTagReader, MetadataProbe, TagReader};
pub use scanner::{CancelToken, LibraryScanner, ScanHandle, ScanOutcome, ScanProgress};
pub use session::{
    EventKind, PlayPauseOutcome, PlaybackSession, PlaybackState, SessionEvent, SubscriptionId,
    Transport,
};
pub use track::{Track, TrackMetadata};

use std::path::Path;

/// Extensions the player treats as audio. Shared by the open-file filter,
/// the library scan and the file-browser view.
pub const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "flac", "ogg", "m4a"];

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub fade_in_duration: u64,  // milliseconds for smooth track start
    pub fade_out_duration: u64, // milliseconds for smooth track stop
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fade_in_duration: 300,  // 300ms smooth fade in
            fade_out_duration: 200, // 200ms smooth fade out
        }
    }
}

impl From<&crate::config::Config> for AudioConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            fade_in_duration: config.audio.fade_in_ms,
            fade_out_duration: config.audio.fade_out_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" => AudioFormat::Ogg,
            "m4a" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}

/// True when `path` carries one of [`AUDIO_EXTENSIONS`] (case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let normalized = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&normalized.as_str())
        })
        .unwrap_or(false)
}

/// `m:ss` rendering used in transcripts
pub fn format_time(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_extensions_match_case_insensitive() {
        assert!(is_audio_file(Path::new("/music/a.mp3")));
        assert!(is_audio_file(Path::new("/music/a.M4A")));
        assert!(is_audio_file(Path::new("/music/a.Flac")));
        assert!(!is_audio_file(Path::new("/music/a.aac")));
        assert!(!is_audio_file(Path::new("/music/cover.jpg")));
        assert!(!is_audio_file(Path::new("/music/README")));
    }

    #[test]
    fn every_allowed_extension_has_a_format() {
        for ext in AUDIO_EXTENSIONS {
            assert!(AudioFormat::from_extension(ext).is_supported(), "{ext}");
        }
    }

    #[test]
    fn format_time_pads_seconds() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(61_000), "1:01");
        assert_eq!(format_time(3_599_999), "59:59");
        assert_eq!(format_time(3_600_000), "60:00");
    }
}
