use super::engine::{EngineError, EngineEvent, EngineEventKind, MediaEngine};
use super::probe::{FileTagReader, TagReader};
use super::AudioConfig;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// `MediaEngine` on top of a rodio output stream.
///
/// rodio has no callback thread of its own, so position and end-of-track
/// events are produced from [`MediaEngine::poll`]. Fades never block the
/// caller: fade-in is part of the decoded source and fade-out runs on a
/// detached thread that owns the outgoing sink.
pub struct RodioEngine {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    source: Option<PathBuf>,
    config: AudioConfig,
    volume: f32, // 0.0 to 1.0
    muted: bool,
    event_sender: Option<mpsc::UnboundedSender<EngineEvent>>,
    tags: FileTagReader,
    last_position: Duration,
    end_reported: bool,
}

impl RodioEngine {
    pub fn new(config: AudioConfig) -> Result<Self, EngineError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| EngineError::Output(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            source: None,
            config,
            volume: 0.7,
            muted: false,
            event_sender: None,
            tags: FileTagReader,
            last_position: Duration::ZERO,
            end_reported: false,
        })
    }

    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<EngineEvent>) {
        self.event_sender = Some(sender);
    }

    /// Post `kind` stamped with the source it belongs to
    fn emit(&self, kind: EngineEventKind) {
        if let (Some(sender), Some(source)) = (&self.event_sender, &self.source) {
            let _ = sender.send(EngineEvent::new(source.clone(), kind));
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Ramp `sink` down over `fade_ms` and stop it, on a detached thread that owns
/// it. Returns immediately.
fn fade_out_detached(sink: Sink, fade_ms: u64) {
    if fade_ms == 0 {
        sink.stop();
        return;
    }

    let start_volume = sink.volume();
    thread::spawn(move || {
        let fade_steps = 15;
        let step_duration = fade_ms / fade_steps;
        let volume_step = start_volume / fade_steps as f32;

        for step in 1..=fade_steps {
            let new_volume = start_volume - (volume_step * step as f32);
            sink.set_volume(new_volume.max(0.0));
            thread::sleep(Duration::from_millis(step_duration));
        }
        sink.stop();
    });
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        self.stop();
        self.source = Some(path.to_path_buf());

        let file = File::open(path).map_err(|e| {
            self.emit(EngineEventKind::Error(format!("Failed to open file: {}", e)));
            EngineError::Open(e.to_string())
        })?;

        let source = Decoder::new(BufReader::new(file)).map_err(|e| {
            self.emit(EngineEventKind::Error(format!(
                "Unsupported audio format or corrupted file: {}",
                e
            )));
            EngineError::Decode(e.to_string())
        })?;
        let total = source.total_duration();

        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| EngineError::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.effective_volume());
        // Smooth start for every freshly loaded track
        sink.append(source.fade_in(Duration::from_millis(self.config.fade_in_duration)));

        self.sink = Some(sink);
        self.last_position = Duration::ZERO;
        self.end_reported = false;
        debug!("Loaded {} into output sink", path.display());

        if let Some(total) = total {
            self.emit(EngineEventKind::DurationChanged(total));
        }
        match self.tags.read(path) {
            Ok(metadata) => {
                if let Some(ms) = metadata.duration_ms.filter(|_| total.is_none()) {
                    self.emit(EngineEventKind::DurationChanged(Duration::from_millis(ms)));
                }
                self.emit(EngineEventKind::MetadataReady(metadata));
            }
            Err(e) => debug!("No tags for {}: {}", path.display(), e),
        }

        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            fade_out_detached(sink, self.config.fade_out_duration);
        }
        self.last_position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) {
        if let Some(sink) = self.sink.as_ref() {
            if let Err(e) = sink.try_seek(position) {
                warn!("Seek to {:?} failed: {}", position, e);
                return;
            }
            self.last_position = position;
            self.emit(EngineEventKind::PositionChanged(position));
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = (volume.min(100) as f32 / 100.0).clamp(0.0, 1.0);
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.effective_volume());
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.effective_volume());
        }
    }

    fn poll(&mut self) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        if sink.empty() {
            if !self.end_reported {
                self.end_reported = true;
                self.emit(EngineEventKind::TrackEnded);
            }
            return;
        }

        if !sink.is_paused() {
            let position = sink.get_pos();
            if position != self.last_position {
                self.last_position = position;
                self.emit(EngineEventKind::PositionChanged(position));
            }
        }
    }
}
