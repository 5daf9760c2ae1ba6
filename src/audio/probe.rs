use super::{AudioFormat, Track, TrackMetadata};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default time a probe waits for metadata before falling back to the filename
pub const DEFAULT_PROBE_WAIT: Duration = Duration::from_millis(100);

/// Reads display metadata out of an audio file.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// Tag reader backed by id3 / mp4ameta, with symphonia for everything else
/// when the `probe` feature is on.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTagReader;

impl TagReader for FileTagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        let metadata = match AudioFormat::from_path(path) {
            AudioFormat::Mp3 => self.extract_id3_metadata(path)?,
            AudioFormat::Wav => self.extract_wav_metadata(path)?,
            AudioFormat::Mp4 => self.extract_mp4_metadata(path)?,
            AudioFormat::Flac | AudioFormat::Ogg => self.extract_other_metadata(path)?,
            AudioFormat::Unknown => {
                return Err(anyhow::anyhow!("not an audio file: {}", path.display()));
            }
        };

        #[cfg(feature = "probe")]
        {
            if metadata.duration_ms.is_none() {
                if let Ok(duration) = probe_duration_with_symphonia(path) {
                    let mut metadata = metadata;
                    metadata.duration_ms = Some(duration.as_millis() as u64);
                    return Ok(metadata.normalized());
                }
            }
        }

        Ok(metadata.normalized())
    }
}

impl FileTagReader {
    fn extract_id3_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        let tag = id3::Tag::read_from_path(path)?;
        Ok(TrackMetadata::from_id3_tag(&tag))
    }

    fn extract_wav_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        let tag = id3::Tag::read_from_wav_path(path)?;
        Ok(TrackMetadata::from_id3_tag(&tag))
    }

    fn extract_mp4_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        let tag = mp4ameta::Tag::read_from_path(path)?;

        Ok(TrackMetadata {
            title: tag.title().map(|s| s.to_string()),
            artist: tag
                .album_artist()
                .or_else(|| tag.artist())
                .map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            // Left to the engine's duration report
            duration_ms: None,
        })
    }

    #[cfg(feature = "probe")]
    fn extract_other_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        read_tags_with_symphonia(path)
    }

    #[cfg(not(feature = "probe"))]
    fn extract_other_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        Err(anyhow::anyhow!(
            "no tag reader for {} without the `probe` feature",
            path.display()
        ))
    }
}

/// Extracts metadata for one file within a fixed wait window.
///
/// The reader runs on the blocking pool. If it errors or does not answer in
/// time the track keeps its filename-derived title and "Unknown" fields.
#[derive(Clone)]
pub struct MetadataProbe {
    reader: Arc<dyn TagReader>,
    wait: Duration,
}

impl MetadataProbe {
    pub fn new(reader: Arc<dyn TagReader>, wait: Duration) -> Self {
        Self { reader, wait }
    }

    pub async fn probe(&self, path: &Path) -> Track {
        let track = Track::new(path.to_path_buf());
        let reader = Arc::clone(&self.reader);
        let owned: PathBuf = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || reader.read(&owned));

        match tokio::time::timeout(self.wait, task).await {
            Ok(Ok(Ok(metadata))) => track.with_metadata(metadata),
            Ok(Ok(Err(e))) => {
                debug!("Using filename fallback for {}: {}", path.display(), e);
                track
            }
            Ok(Err(e)) => {
                warn!("Metadata reader panicked on {}: {}", path.display(), e);
                track
            }
            Err(_) => {
                debug!(
                    "Metadata for {} not ready within {:?}, using fallback",
                    path.display(),
                    self.wait
                );
                track
            }
        }
    }
}

impl Default for MetadataProbe {
    fn default() -> Self {
        Self::new(Arc::new(FileTagReader), DEFAULT_PROBE_WAIT)
    }
}

#[cfg(feature = "probe")]
fn read_tags_with_symphonia(path: &Path) -> Result<TrackMetadata> {
    use std::fs::File;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
    use symphonia::core::probe::Hint;

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut metadata = TrackMetadata::default();
    let mut track_artist = None;
    let mut apply = |tags: &[Tag]| {
        for tag in tags {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => metadata.title = Some(tag.value.to_string()),
                Some(StandardTagKey::AlbumArtist) => metadata.artist = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => track_artist = Some(tag.value.to_string()),
                Some(StandardTagKey::Album) => metadata.album = Some(tag.value.to_string()),
                _ => {}
            }
        }
    };

    if let Some(container) = probed.metadata.get() {
        if let Some(revision) = container.current() {
            apply(revision.tags());
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        apply(revision.tags());
    }

    if metadata.artist.is_none() {
        metadata.artist = track_artist;
    }
    Ok(metadata)
}

/// Feature-gated duration probing using symphonia codec
#[cfg(feature = "probe")]
fn probe_duration_with_symphonia(path: &Path) -> Result<Duration> {
    use std::fs::File;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No supported audio tracks found"))?;

    if let (Some(time_base), Some(n_frames)) =
        (track.codec_params.time_base, track.codec_params.n_frames)
    {
        let time = time_base.calc_time(n_frames);
        return Ok(Duration::from_secs_f64(time.seconds as f64 + time.frac));
    }

    Err(anyhow::anyhow!("Could not determine duration from file"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct SlowReader(Duration);

    impl TagReader for SlowReader {
        fn read(&self, _path: &Path) -> Result<TrackMetadata> {
            std::thread::sleep(self.0);
            Ok(TrackMetadata {
                title: Some("Too Late".into()),
                ..TrackMetadata::default()
            })
        }
    }

    struct FixedReader;

    impl TagReader for FixedReader {
        fn read(&self, _path: &Path) -> Result<TrackMetadata> {
            Ok(TrackMetadata {
                title: Some("Tagged".into()),
                artist: Some("Band".into()),
                album: Some("Record".into()),
                duration_ms: Some(90_000),
            })
        }
    }

    #[tokio::test]
    async fn probe_uses_reader_result_when_in_time() {
        let probe = MetadataProbe::new(Arc::new(FixedReader), Duration::from_secs(5));
        let track = probe.probe(Path::new("/music/x.mp3")).await;
        assert_eq!(track.display_title(), "Tagged");
        assert_eq!(track.display_artist(), "Band");
        assert_eq!(track.display_album(), "Record");
        assert_eq!(track.duration_ms(), 90_000);
    }

    #[tokio::test]
    async fn probe_falls_back_when_reader_is_too_slow() {
        let probe = MetadataProbe::new(
            Arc::new(SlowReader(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let track = probe.probe(Path::new("/music/late song.ogg")).await;
        assert_eq!(track.display_title(), "late song");
        assert_eq!(track.display_artist(), "Unknown Artist");
        assert_eq!(track.display_album(), "Unknown Album");
    }

    #[tokio::test]
    async fn file_reader_falls_back_on_garbage_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"definitely not id3").unwrap();

        assert!(FileTagReader.read(&path).is_err());

        let track = MetadataProbe::default().probe(&path).await;
        assert_eq!(track.display_title(), "broken");
        assert_eq!(track.file_path, path);
    }

    #[test]
    fn file_reader_rejects_unknown_formats() {
        assert!(FileTagReader.read(Path::new("/music/notes.txt")).is_err());
    }
}
