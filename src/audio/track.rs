use super::AudioFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// A playable audio item. Identity is the file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub file_path: PathBuf,
    pub metadata: TrackMetadata,
    pub format: AudioFormat,
    pub duration: Option<Duration>,
    /// In-memory edits from the user. Never written back to the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edits: Option<TrackMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

impl Track {
    /// Track for a directly selected file: title comes from the filename stem.
    pub fn new(file_path: PathBuf) -> Self {
        let format = AudioFormat::from_path(&file_path);

        Self {
            file_path,
            metadata: TrackMetadata::default(),
            format,
            duration: None,
            edits: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = metadata.normalized();
        if let Some(duration_ms) = self.metadata.duration_ms {
            self.duration = Some(Duration::from_millis(duration_ms));
        }
        self
    }

    pub fn same_identity(&self, other: &Track) -> bool {
        self.file_path == other.file_path
    }

    pub fn file_stem(&self) -> String {
        file_stem(&self.file_path)
    }

    pub fn display_title(&self) -> String {
        self.edited(|m| m.title.clone())
            .or_else(|| self.metadata.title.clone())
            .unwrap_or_else(|| self.file_stem())
    }

    pub fn display_artist(&self) -> String {
        self.edited(|m| m.artist.clone())
            .or_else(|| self.metadata.artist.clone())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
    }

    pub fn display_album(&self) -> String {
        self.edited(|m| m.album.clone())
            .or_else(|| self.metadata.album.clone())
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
    }

    /// Duration in milliseconds, 0 when it was never learned
    pub fn duration_ms(&self) -> u64 {
        self.duration.map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    /// Record a duration reported at playback time. Only fills in unknown
    /// durations or corrects ones that are off by more than two seconds.
    pub fn learn_duration(&mut self, actual_duration: Duration) {
        match self.duration {
            None => {
                self.duration = Some(actual_duration);
                self.metadata.duration_ms = Some(actual_duration.as_millis() as u64);
            }
            Some(existing) => {
                let diff = if actual_duration > existing {
                    actual_duration - existing
                } else {
                    existing - actual_duration
                };

                if diff > Duration::from_secs(2) {
                    self.duration = Some(actual_duration);
                    self.metadata.duration_ms = Some(actual_duration.as_millis() as u64);
                }
            }
        }
    }

    /// Replace the display fields that the engine reported for this file.
    /// Empty values are treated as missing so the fallbacks still apply.
    pub fn merge_reported(&mut self, reported: &TrackMetadata) {
        let reported = reported.clone().normalized();
        self.metadata.title = reported.title;
        self.metadata.artist = reported.artist;
        self.metadata.album = reported.album;
        if let Some(ms) = reported.duration_ms {
            self.learn_duration(Duration::from_millis(ms));
        }
    }

    /// User edit of the display fields, kept in memory only.
    pub fn apply_edit(&mut self, title: &str, artist: &str, album: &str) {
        self.edits = Some(
            TrackMetadata {
                title: Some(title.to_string()),
                artist: Some(artist.to_string()),
                album: Some(album.to_string()),
                duration_ms: None,
            }
            .normalized(),
        );
    }

    pub fn clear_edit(&mut self) {
        self.edits = None;
    }

    fn edited(&self, field: impl Fn(&TrackMetadata) -> Option<String>) -> Option<String> {
        self.edits.as_ref().and_then(field)
    }
}

impl TrackMetadata {
    /// Blank strings become `None`, surrounding whitespace is trimmed
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        Self {
            title: clean(self.title),
            artist: clean(self.artist),
            album: clean(self.album),
            duration_ms: self.duration_ms.filter(|ms| *ms > 0),
        }
    }

    pub fn from_id3_tag(tag: &id3::Tag) -> Self {
        use id3::TagLike;

        Self {
            title: tag.title().map(|s| s.to_string()),
            // Album artist wins over the per-track artist, the same order the
            // engine uses when it reports metadata
            artist: tag
                .album_artist()
                .or_else(|| tag.artist())
                .map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            duration_ms: tag.duration().map(|d| d as u64),
        }
        .normalized()
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_track_falls_back_to_filename_and_unknowns() {
        let track = Track::new(PathBuf::from("/music/Artist/01 Intro.flac"));
        assert_eq!(track.display_title(), "01 Intro");
        assert_eq!(track.display_artist(), UNKNOWN_ARTIST);
        assert_eq!(track.display_album(), UNKNOWN_ALBUM);
        assert_eq!(track.format, AudioFormat::Flac);
        assert_eq!(track.duration_ms(), 0);
    }

    #[test]
    fn blank_metadata_is_treated_as_missing() {
        let track = Track::new(PathBuf::from("/music/song.mp3")).with_metadata(TrackMetadata {
            title: Some("   ".into()),
            artist: Some(" Band ".into()),
            album: None,
            duration_ms: Some(183_000),
        });
        assert_eq!(track.display_title(), "song");
        assert_eq!(track.display_artist(), "Band");
        assert_eq!(track.duration_ms(), 183_000);
    }

    #[test]
    fn edits_override_display_without_touching_metadata() {
        let mut track = Track::new(PathBuf::from("/music/song.mp3")).with_metadata(TrackMetadata {
            title: Some("Original".into()),
            ..TrackMetadata::default()
        });

        track.apply_edit("Edited", "Someone", "");
        assert_eq!(track.display_title(), "Edited");
        assert_eq!(track.display_artist(), "Someone");
        assert_eq!(track.display_album(), UNKNOWN_ALBUM);
        assert_eq!(track.metadata.title.as_deref(), Some("Original"));

        track.clear_edit();
        assert_eq!(track.display_title(), "Original");
    }

    #[test]
    fn learn_duration_ignores_small_differences() {
        let mut track = Track::new(PathBuf::from("/music/a.ogg"));
        track.learn_duration(Duration::from_secs(200));
        assert_eq!(track.duration_ms(), 200_000);

        track.learn_duration(Duration::from_millis(201_500));
        assert_eq!(track.duration_ms(), 200_000);

        track.learn_duration(Duration::from_secs(210));
        assert_eq!(track.duration_ms(), 210_000);
    }

    #[test]
    fn identity_is_the_path() {
        let a = Track::new(PathBuf::from("/music/a.mp3"));
        let mut b = Track::new(PathBuf::from("/music/a.mp3"));
        b.apply_edit("x", "y", "z");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&Track::new(PathBuf::from("/music/b.mp3"))));
    }
}
