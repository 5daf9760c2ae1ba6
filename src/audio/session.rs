use super::engine::{EngineEvent, EngineEventKind, MediaEngine};
use super::playlist::{Advance, PlaylistEngine, Retreat};
use super::track::{Track, TrackMetadata};
use super::format_time;
use crate::error::{PlayerError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What `play_pause` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPauseOutcome {
    Paused,
    Resumed,
    Started(usize),
    /// Nothing queued; a file has to be chosen by whoever drives the session
    RequestFile,
}

/// Result of a playlist-driven transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Playing(usize),
    /// Loaded while paused; stays paused on the new entry
    Cued(usize),
    Restarted,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    TrackChanged,
    Position,
    Duration,
    Metadata,
    Volume,
    LoadFailed,
    EngineError,
}

/// Notifications published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(PlaybackState),
    TrackChanged(Option<Track>),
    Position { position_ms: u64, duration_ms: u64 },
    Duration(u64),
    Metadata(Track),
    Volume { volume: u8, muted: bool },
    LoadFailed { path: PathBuf, reason: String },
    EngineError(String),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::StateChanged(_) => EventKind::StateChanged,
            SessionEvent::TrackChanged(_) => EventKind::TrackChanged,
            SessionEvent::Position { .. } => EventKind::Position,
            SessionEvent::Duration(_) => EventKind::Duration,
            SessionEvent::Metadata(_) => EventKind::Metadata,
            SessionEvent::Volume { .. } => EventKind::Volume,
            SessionEvent::LoadFailed { .. } => EventKind::LoadFailed,
            SessionEvent::EngineError(_) => EventKind::EngineError,
        }
    }

    /// One human-readable line for status displays
    pub fn transcript(&self) -> String {
        match self {
            SessionEvent::StateChanged(state) => format!("{:?}", state),
            SessionEvent::TrackChanged(Some(track)) | SessionEvent::Metadata(track) => format!(
                "Now playing: {} - {} [{}]",
                track.display_artist(),
                track.display_title(),
                track.display_album()
            ),
            SessionEvent::TrackChanged(None) => "No track loaded".to_string(),
            SessionEvent::Position {
                position_ms,
                duration_ms,
            } => format!("{} / {}", format_time(*position_ms), format_time(*duration_ms)),
            SessionEvent::Duration(ms) => format!("Duration: {}", format_time(*ms)),
            SessionEvent::Volume { volume, muted: true } => format!("Volume: {}% (muted)", volume),
            SessionEvent::Volume { volume, .. } => format!("Volume: {}%", volume),
            SessionEvent::LoadFailed { path, reason } => {
                format!("Could not play {}: {}", path.display(), reason)
            }
            SessionEvent::EngineError(message) => format!("Playback error: {}", message),
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&SessionEvent)>;

/// Identifies a registered handler for [`PlaybackSession::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

/// Transport state machine over a [`MediaEngine`].
///
/// A non-stopped session always has a current track. Volume and mute are
/// independent so unmuting restores the exact previous level.
pub struct PlaybackSession<E: MediaEngine> {
    engine: E,
    state: PlaybackState,
    current: Option<Track>,
    position_ms: u64,
    duration_ms: u64,
    volume: u8,
    muted: bool,
    subscribers: Vec<(SubscriptionId, EventKind, EventHandler)>,
    next_subscription: usize,
}

impl<E: MediaEngine> PlaybackSession<E> {
    pub fn new(mut engine: E, volume: u8) -> Self {
        let volume = volume.min(100);
        engine.set_volume(volume);

        Self {
            engine,
            state: PlaybackState::Stopped,
            current: None,
            position_ms: 0,
            duration_ms: 0,
            volume,
            muted: false,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&SessionEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, kind, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn emit(&mut self, event: SessionEvent) {
        let kind = event.kind();
        for (_, wanted, handler) in self.subscribers.iter_mut() {
            if *wanted == kind {
                handler(&event);
            }
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    /// Load `track` and start it from the beginning.
    ///
    /// On a load failure the session ends up stopped and reports
    /// `LoadFailed`; nothing is retried here.
    pub fn play(&mut self, track: Track) -> Result<()> {
        self.load(track, true)
    }

    /// Without `start` the session is left paused at 0 on the new track
    fn load(&mut self, track: Track, start: bool) -> Result<()> {
        if let Err(e) = self.engine.load(&track.file_path) {
            let reason = e.to_string();
            warn!("Failed to load {}: {}", track.file_path.display(), reason);
            self.stop();
            self.emit(SessionEvent::LoadFailed {
                path: track.file_path.clone(),
                reason: reason.clone(),
            });
            return Err(PlayerError::LoadFailed {
                path: track.file_path,
                reason,
            });
        }

        self.position_ms = 0;
        self.duration_ms = track.duration_ms();
        self.current = Some(track.clone());
        if start {
            info!("Playing {}", track.file_path.display());
            self.engine.play();
        } else {
            info!("Cued {}", track.file_path.display());
        }

        self.emit(SessionEvent::TrackChanged(Some(track)));
        self.set_state(if start {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        });
        Ok(())
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.engine.pause();
        self.set_state(PlaybackState::Paused);
        true
    }

    /// Continue a paused track without reloading it
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.engine.play();
        self.set_state(PlaybackState::Playing);
        true
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.position_ms = 0;
        self.duration_ms = 0;
        let had_track = self.current.take().is_some();
        self.set_state(PlaybackState::Stopped);
        if had_track {
            debug!("Playback stopped");
            self.emit(SessionEvent::TrackChanged(None));
        }
    }

    /// Seek within the loaded track; ignored while stopped.
    /// Targets are clamped to `[0, duration]`, so nothing moves past the
    /// start until a duration is known.
    pub fn seek(&mut self, position_ms: u64) -> bool {
        if self.state == PlaybackState::Stopped {
            return false;
        }

        let target = position_ms.min(self.duration_ms);
        self.engine.seek(Duration::from_millis(target));
        self.position_ms = target;
        self.emit(SessionEvent::Position {
            position_ms: target,
            duration_ms: self.duration_ms,
        });
        true
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.engine.set_volume(self.volume);
        self.emit(SessionEvent::Volume {
            volume: self.volume,
            muted: self.muted,
        });
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.engine.set_muted(self.muted);
        self.emit(SessionEvent::Volume {
            volume: self.volume,
            muted: self.muted,
        });
        self.muted
    }

    /// Play the playlist entry at `index`, moving the cursor there
    pub fn play_index(&mut self, playlist: &mut PlaylistEngine, index: usize) -> Result<()> {
        self.open_index(playlist, index, true)
    }

    fn open_index(&mut self, playlist: &mut PlaylistEngine, index: usize, start: bool) -> Result<()> {
        playlist.set_cursor(index)?;
        let track = playlist
            .get(index)
            .cloned()
            .ok_or(PlayerError::OutOfRange {
                index,
                len: playlist.len(),
            })?;
        self.load(track, start)
    }

    /// Skips land on the new entry in the same mode: paused stays paused
    fn step_to(&mut self, playlist: &mut PlaylistEngine, index: usize) -> Result<Transport> {
        if self.state == PlaybackState::Paused {
            self.open_index(playlist, index, false)?;
            Ok(Transport::Cued(index))
        } else {
            self.open_index(playlist, index, true)?;
            Ok(Transport::Playing(index))
        }
    }

    pub fn play_pause(&mut self, playlist: &mut PlaylistEngine) -> Result<PlayPauseOutcome> {
        match self.state {
            PlaybackState::Playing => {
                self.pause();
                Ok(PlayPauseOutcome::Paused)
            }
            PlaybackState::Paused => {
                self.resume();
                Ok(PlayPauseOutcome::Resumed)
            }
            PlaybackState::Stopped => {
                if playlist.is_empty() {
                    debug!("Nothing queued, requesting a file");
                    return Ok(PlayPauseOutcome::RequestFile);
                }
                let index = playlist.cursor().unwrap_or(0);
                self.play_index(playlist, index)?;
                Ok(PlayPauseOutcome::Started(index))
            }
        }
    }

    /// Fails with `EmptyPlaylist` when nothing is queued
    pub fn next(&mut self, playlist: &mut PlaylistEngine) -> Result<Transport> {
        if playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        let step = playlist.next();
        self.follow(playlist, step)
    }

    pub fn previous(&mut self, playlist: &mut PlaylistEngine) -> Result<Transport> {
        if playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        match playlist.previous(self.position_ms) {
            Retreat::RestartCurrent => {
                self.seek(0);
                Ok(Transport::Restarted)
            }
            Retreat::Moved(index) => self.step_to(playlist, index),
            Retreat::Stop => {
                self.stop();
                Ok(Transport::Stopped)
            }
        }
    }

    fn follow(&mut self, playlist: &mut PlaylistEngine, step: Advance) -> Result<Transport> {
        match step {
            Advance::Advanced(index) | Advance::Replay(index) => self.step_to(playlist, index),
            Advance::Stop => {
                self.stop();
                Ok(Transport::Stopped)
            }
        }
    }

    /// Apply one engine event. A natural end of track asks the playlist for
    /// the next entry and returns the resulting transition.
    ///
    /// Events stamped with a source other than the loaded track were queued
    /// before a later load and are dropped. Engine errors are always reported.
    pub fn handle_engine_event(
        &mut self,
        event: EngineEvent,
        playlist: &mut PlaylistEngine,
    ) -> Option<Result<Transport>> {
        let EngineEvent { source, kind } = event;
        let is_current = self
            .current
            .as_ref()
            .map_or(false, |track| track.file_path == source);
        if !is_current && !matches!(kind, EngineEventKind::Error(_)) {
            debug!("Dropping stale engine event for {}: {:?}", source.display(), kind);
            return None;
        }

        match kind {
            EngineEventKind::PositionChanged(position) => {
                if self.state != PlaybackState::Stopped {
                    self.position_ms = position.as_millis() as u64;
                    self.emit(SessionEvent::Position {
                        position_ms: self.position_ms,
                        duration_ms: self.duration_ms,
                    });
                }
                None
            }
            EngineEventKind::DurationChanged(duration) => {
                self.duration_ms = duration.as_millis() as u64;
                if let Some(track) = self.current.as_mut() {
                    track.learn_duration(duration);
                }
                if let Some(entry) = self.matching_entry(playlist) {
                    entry.learn_duration(duration);
                }
                self.emit(SessionEvent::Duration(self.duration_ms));
                None
            }
            EngineEventKind::MetadataReady(reported) => {
                self.merge_metadata(&reported, playlist);
                None
            }
            EngineEventKind::TrackEnded => {
                if self.state != PlaybackState::Playing {
                    return None;
                }
                let step = playlist.next_on_end();
                debug!("Track ended, next step {:?}", step);
                Some(self.follow(playlist, step))
            }
            EngineEventKind::Error(message) => {
                warn!("Engine error: {}", message);
                self.emit(SessionEvent::EngineError(message));
                None
            }
        }
    }

    fn merge_metadata(&mut self, reported: &TrackMetadata, playlist: &mut PlaylistEngine) {
        let Some(track) = self.current.as_mut() else {
            return;
        };
        track.merge_reported(reported);
        let updated = track.clone();

        if let Some(entry) = self.matching_entry(playlist) {
            entry.merge_reported(reported);
        }
        self.emit(SessionEvent::Metadata(updated));
    }

    /// In-memory override of the current track's display fields
    pub fn edit_metadata(
        &mut self,
        playlist: &mut PlaylistEngine,
        title: &str,
        artist: &str,
        album: &str,
    ) -> bool {
        let Some(track) = self.current.as_mut() else {
            return false;
        };
        track.apply_edit(title, artist, album);
        let updated = track.clone();

        if let Some(entry) = self.matching_entry(playlist) {
            entry.apply_edit(title, artist, album);
        }
        info!("Edited display metadata for {}", updated.file_path.display());
        self.emit(SessionEvent::Metadata(updated));
        true
    }

    /// The playlist entry under the cursor, when it is the loaded track
    fn matching_entry<'p>(&self, playlist: &'p mut PlaylistEngine) -> Option<&'p mut Track> {
        let current = self.current.as_ref()?;
        playlist
            .current_mut()
            .filter(|entry| entry.same_identity(current))
    }

    /// Give the engine a chance to post its events
    pub fn poll_engine(&mut self) {
        self.engine.poll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::fake::{EngineCall, FakeEngine};
    use crate::audio::playlist::RepeatMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn queue(names: &[&str]) -> PlaylistEngine {
        let mut playlist = PlaylistEngine::new();
        playlist.append(
            names
                .iter()
                .map(|n| Track::new(PathBuf::from(format!("/music/{n}.mp3"))))
                .collect(),
            false,
        );
        playlist
    }

    fn from(name: &str, kind: EngineEventKind) -> EngineEvent {
        EngineEvent::new(format!("/music/{name}.mp3"), kind)
    }

    fn session() -> PlaybackSession<FakeEngine> {
        PlaybackSession::new(FakeEngine::default(), 70)
    }

    fn record(session: &mut PlaybackSession<FakeEngine>, kind: EventKind) -> Rc<RefCell<Vec<SessionEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.subscribe(kind, move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn play_pause_on_empty_playlist_requests_a_file() {
        let mut session = session();
        let mut playlist = PlaylistEngine::new();

        let outcome = session.play_pause(&mut playlist).unwrap();
        assert_eq!(outcome, PlayPauseOutcome::RequestFile);
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(session.engine().loads().is_empty());
    }

    #[test]
    fn play_pause_cycles_through_states() {
        let mut session = session();
        let mut playlist = queue(&["a", "b"]);

        assert_eq!(session.play_pause(&mut playlist).unwrap(), PlayPauseOutcome::Started(0));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(playlist.cursor(), Some(0));

        assert_eq!(session.play_pause(&mut playlist).unwrap(), PlayPauseOutcome::Paused);
        assert_eq!(session.state(), PlaybackState::Paused);

        assert_eq!(session.play_pause(&mut playlist).unwrap(), PlayPauseOutcome::Resumed);
        assert_eq!(session.state(), PlaybackState::Playing);
        // Resume does not reload
        assert_eq!(session.engine().loads().len(), 1);
    }

    #[test]
    fn stop_clears_the_current_track() {
        let mut session = session();
        let mut playlist = queue(&["a"]);
        session.play_index(&mut playlist, 0).unwrap();
        session.handle_engine_event(from("a", EngineEventKind::PositionChanged(Duration::from_secs(12))), &mut playlist);
        assert_eq!(session.position_ms(), 12_000);

        session.stop();
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(session.current().is_none());
        assert_eq!(session.position_ms(), 0);
    }

    #[test]
    fn track_end_advances_then_stops_at_the_end() {
        let mut session = session();
        let mut playlist = queue(&["a", "b"]);
        session.play_index(&mut playlist, 0).unwrap();

        let step = session.handle_engine_event(from("a", EngineEventKind::TrackEnded), &mut playlist);
        assert_eq!(step.unwrap().unwrap(), Transport::Playing(1));
        assert_eq!(session.current().unwrap().file_path, PathBuf::from("/music/b.mp3"));

        let step = session.handle_engine_event(from("b", EngineEventKind::TrackEnded), &mut playlist);
        assert_eq!(step.unwrap().unwrap(), Transport::Stopped);
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(playlist.cursor(), Some(1));
    }

    #[test]
    fn repeat_one_reloads_the_same_track_on_end() {
        let mut session = session();
        let mut playlist = queue(&["a", "b"]);
        playlist.set_repeat(RepeatMode::One);
        session.play_index(&mut playlist, 0).unwrap();

        session.handle_engine_event(from("a", EngineEventKind::TrackEnded), &mut playlist);
        assert_eq!(
            session.engine().loads(),
            vec![PathBuf::from("/music/a.mp3"), PathBuf::from("/music/a.mp3")]
        );
    }

    #[test]
    fn previous_restarts_late_in_the_track() {
        let mut session = session();
        let mut playlist = queue(&["a", "b"]);
        session.play_index(&mut playlist, 1).unwrap();
        session.handle_engine_event(from("b", EngineEventKind::DurationChanged(Duration::from_secs(200))), &mut playlist);
        session.handle_engine_event(from("b", EngineEventKind::PositionChanged(Duration::from_secs(10))), &mut playlist);

        assert_eq!(session.previous(&mut playlist).unwrap(), Transport::Restarted);
        assert_eq!(session.engine().last(), Some(&EngineCall::Seek(Duration::ZERO)));
        assert_eq!(playlist.cursor(), Some(1));

        assert_eq!(session.previous(&mut playlist).unwrap(), Transport::Playing(0));
    }

    #[test]
    fn seek_clamps_and_is_ignored_when_stopped() {
        let mut session = session();
        let mut playlist = queue(&["a"]);
        assert!(!session.seek(1_000));

        session.play_index(&mut playlist, 0).unwrap();
        session.handle_engine_event(from("a", EngineEventKind::DurationChanged(Duration::from_secs(60))), &mut playlist);
        assert!(session.seek(90_000));
        assert_eq!(session.position_ms(), 60_000);
        assert_eq!(session.engine().last(), Some(&EngineCall::Seek(Duration::from_secs(60))));
    }

    #[test]
    fn seek_before_the_duration_is_known_stays_at_the_start() {
        let mut session = session();
        let mut playlist = queue(&["a"]);
        session.play_index(&mut playlist, 0).unwrap();
        assert_eq!(session.duration_ms(), 0);

        assert!(session.seek(9_999_999));
        assert_eq!(session.position_ms(), 0);
        assert_eq!(session.engine().last(), Some(&EngineCall::Seek(Duration::ZERO)));
    }

    #[test]
    fn muting_keeps_the_volume_level() {
        let mut session = session();
        session.set_volume(40);
        assert!(session.toggle_mute());
        assert_eq!(session.volume(), 40);
        assert!(!session.toggle_mute());
        assert_eq!(session.volume(), 40);
        assert_eq!(session.engine().last(), Some(&EngineCall::Muted(false)));

        session.set_volume(250);
        assert_eq!(session.volume(), 100);
    }

    #[test]
    fn load_failure_is_recoverable_and_leaves_session_stopped() {
        let mut session = PlaybackSession::new(FakeEngine::failing_on(["/music/b.mp3"]), 70);
        let failures = record(&mut session, EventKind::LoadFailed);
        let mut playlist = queue(&["a", "b", "c"]);
        session.play_index(&mut playlist, 0).unwrap();

        let err = session.next(&mut playlist).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(session.current().is_none());
        assert_eq!(playlist.cursor(), Some(1));
        assert_eq!(failures.borrow().len(), 1);

        // Traversal carries on from the failed entry
        assert_eq!(session.next(&mut playlist).unwrap(), Transport::Playing(2));
    }

    #[test]
    fn metadata_merges_into_session_and_playlist() {
        let mut session = session();
        let seen = record(&mut session, EventKind::Metadata);
        let mut playlist = queue(&["a"]);
        session.play_index(&mut playlist, 0).unwrap();

        let reported = TrackMetadata {
            title: Some(String::new()),
            artist: Some("Band".into()),
            album: Some("Record".into()),
            duration_ms: None,
        };
        session.handle_engine_event(from("a", EngineEventKind::MetadataReady(reported)), &mut playlist);

        let current = session.current().unwrap();
        assert_eq!(current.display_title(), "a");
        assert_eq!(current.display_artist(), "Band");
        assert_eq!(playlist.current().unwrap().display_album(), "Record");
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].transcript(), "Now playing: Band - a [Record]");
    }

    #[test]
    fn subscribers_only_see_their_kind_until_unsubscribed() {
        let mut session = session();
        let states = record(&mut session, EventKind::StateChanged);
        let volume_calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&volume_calls);
        let id = session.subscribe(EventKind::Volume, move |_| *counter.borrow_mut() += 1);

        let mut playlist = queue(&["a"]);
        session.play_pause(&mut playlist).unwrap();
        session.set_volume(10);
        assert!(session.unsubscribe(id));
        session.set_volume(20);

        assert_eq!(*states.borrow(), vec![SessionEvent::StateChanged(PlaybackState::Playing)]);
        assert_eq!(*volume_calls.borrow(), 1);
    }

    #[test]
    fn edits_reach_the_playlist_entry() {
        let mut session = session();
        let mut playlist = queue(&["a"]);
        assert!(!session.edit_metadata(&mut playlist, "x", "y", "z"));

        session.play_index(&mut playlist, 0).unwrap();
        assert!(session.edit_metadata(&mut playlist, "Title", "Artist", "Album"));
        assert_eq!(playlist.entries()[0].display_title(), "Title");
        assert_eq!(session.current().unwrap().display_artist(), "Artist");
    }

    #[test]
    fn events_from_an_earlier_source_are_dropped() {
        let mut session = session();
        let seen = record(&mut session, EventKind::Metadata);
        let mut playlist = queue(&["a", "b"]);
        session.play_index(&mut playlist, 0).unwrap();
        session.next(&mut playlist).unwrap();

        let late = TrackMetadata {
            title: Some("Song A".into()),
            artist: Some("Artist A".into()),
            album: None,
            duration_ms: None,
        };
        session.handle_engine_event(from("a", EngineEventKind::MetadataReady(late)), &mut playlist);
        let ended = session.handle_engine_event(from("a", EngineEventKind::TrackEnded), &mut playlist);

        assert!(ended.is_none());
        assert_eq!(playlist.cursor(), Some(1));
        assert_eq!(session.current().unwrap().display_title(), "b");
        assert_eq!(playlist.entries()[1].display_title(), "b");
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn skipping_while_paused_cues_without_playing() {
        let mut session = session();
        let mut playlist = queue(&["a", "b", "c"]);
        session.play_index(&mut playlist, 0).unwrap();
        session.pause();

        assert_eq!(session.next(&mut playlist).unwrap(), Transport::Cued(1));
        assert_eq!(session.state(), PlaybackState::Paused);
        assert_eq!(session.current().unwrap().file_path, PathBuf::from("/music/b.mp3"));
        assert_eq!(session.engine().last(), Some(&EngineCall::Load(PathBuf::from("/music/b.mp3"))));

        assert_eq!(session.previous(&mut playlist).unwrap(), Transport::Cued(0));
        assert_eq!(session.state(), PlaybackState::Paused);

        // Resuming plays the cued entry without another load
        assert_eq!(session.play_pause(&mut playlist).unwrap(), PlayPauseOutcome::Resumed);
        assert_eq!(session.engine().loads().len(), 3);
        assert_eq!(session.engine().last(), Some(&EngineCall::Play));
    }

    #[test]
    fn skipping_with_nothing_queued_is_an_empty_playlist() {
        let mut session = session();
        let mut playlist = PlaylistEngine::new();

        assert!(matches!(session.next(&mut playlist), Err(PlayerError::EmptyPlaylist)));
        assert!(matches!(session.previous(&mut playlist), Err(PlayerError::EmptyPlaylist)));
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(session.engine().calls.iter().all(|c| !matches!(c, EngineCall::Load(_))));
    }
}
