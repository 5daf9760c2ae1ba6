// Boundary to the component that actually decodes and outputs audio.
// The core only issues primitives and reacts to the events it posts back.

use super::track::TrackMetadata;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    PositionChanged(Duration),
    DurationChanged(Duration),
    MetadataReady(TrackMetadata),
    /// Natural end of the loaded source
    TrackEnded,
    Error(String),
}

/// An event a media engine posts onto the owner's queue, stamped with the
/// source that was loaded when it was produced.
///
/// Events can still be queued when the owner loads something else, so
/// consumers compare `source` against what they currently hold.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub source: PathBuf,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(source: impl Into<PathBuf>, kind: EngineEventKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to open source: {0}")]
    Open(String),
    #[error("unsupported audio format or corrupted file: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Playback primitives provided by the external engine.
///
/// Commands return once issued. Position, duration and metadata arrive
/// later as [`EngineEvent`]s.
pub trait MediaEngine {
    /// Replace the current source. The engine starts paused.
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    /// Volume in percent, 0-100
    fn set_volume(&mut self, volume: u8);
    fn set_muted(&mut self, muted: bool);

    /// Give engines without their own callback thread a chance to post
    /// position and end-of-track events. Called periodically by the owner.
    fn poll(&mut self) {}
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum EngineCall {
        Load(PathBuf),
        Play,
        Pause,
        Stop,
        Seek(Duration),
        Volume(u8),
        Muted(bool),
    }

    /// Records every primitive it receives; loads of `failing` paths error.
    /// With `events` set, a load of a path in `tags` posts `MetadataReady`
    /// straight away, the way the rodio engine does.
    #[derive(Debug, Default)]
    pub struct FakeEngine {
        pub calls: Vec<EngineCall>,
        pub failing: HashSet<PathBuf>,
        pub tags: HashMap<PathBuf, TrackMetadata>,
        pub events: Option<mpsc::UnboundedSender<EngineEvent>>,
    }

    impl FakeEngine {
        pub fn failing_on<I, P>(paths: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: Into<PathBuf>,
        {
            Self {
                failing: paths.into_iter().map(Into::into).collect(),
                ..Self::default()
            }
        }

        pub fn tagged(mut self, path: impl Into<PathBuf>, metadata: TrackMetadata) -> Self {
            self.tags.insert(path.into(), metadata);
            self
        }

        pub fn loads(&self) -> Vec<PathBuf> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    EngineCall::Load(path) => Some(path.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn last(&self) -> Option<&EngineCall> {
            self.calls.last()
        }
    }

    impl MediaEngine for FakeEngine {
        fn load(&mut self, path: &Path) -> Result<(), EngineError> {
            self.calls.push(EngineCall::Load(path.to_path_buf()));
            if self.failing.contains(path) {
                return Err(EngineError::Decode(format!("cannot decode {}", path.display())));
            }
            if let (Some(events), Some(metadata)) = (&self.events, self.tags.get(path)) {
                let _ = events.send(EngineEvent::new(
                    path,
                    EngineEventKind::MetadataReady(metadata.clone()),
                ));
            }
            Ok(())
        }

        fn play(&mut self) {
            self.calls.push(EngineCall::Play);
        }

        fn pause(&mut self) {
            self.calls.push(EngineCall::Pause);
        }

        fn stop(&mut self) {
            self.calls.push(EngineCall::Stop);
        }

        fn seek(&mut self, position: Duration) {
            self.calls.push(EngineCall::Seek(position));
        }

        fn set_volume(&mut self, volume: u8) {
            self.calls.push(EngineCall::Volume(volume));
        }

        fn set_muted(&mut self, muted: bool) {
            self.calls.push(EngineCall::Muted(muted));
        }
    }
}
