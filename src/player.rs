use crate::audio::playlist_file;
use crate::audio::{
    EngineEvent, LibraryIndex, LibraryScanner, MediaEngine, PlayPauseOutcome, PlaybackSession,
    PlaylistEngine, ScanHandle, ScanProgress, Track, Transport,
};
use crate::config::Config;
use crate::equalizer::Equalizer;
use crate::error::{PlayerError, Result};
use crate::settings::{self, SettingsStore};
use crate::sleep_timer::{self, SleepSetting, SleepTimer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Requests applied one at a time, in arrival order, by [`Player::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlayPause,
    Stop,
    Next,
    Previous,
    Seek(u64),
    SetVolume(u8),
    ToggleMute,
    ToggleShuffle,
    CycleRepeat,
    /// Jump to a playlist entry and play it
    PlayIndex(usize),
    /// Add files to the playlist; starts the first one if nothing is selected
    Open(Vec<PathBuf>),
    Remove(Vec<usize>),
    CreatePlaylist(String),
    LoadPlaylist(PathBuf),
    SavePlaylist(PathBuf),
    Scan(PathBuf),
    CancelScan,
    Search(String),
    /// Play a library row, adding it to the playlist if its path isn't there yet
    Adopt(usize),
    /// Append every library row matching the query
    Enqueue(String),
    EditMetadata {
        title: String,
        artist: String,
        album: String,
    },
    SetEqualizerBand {
        band: usize,
        gain: i32,
    },
    LoadPreset(String),
    SavePreset(String),
    SetSleep(SleepSetting),
    ShowPlaylist,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    /// Parse one line of the text command language used by the CLI
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let number = |what: &str| -> std::result::Result<usize, String> {
            rest.parse::<usize>()
                .map_err(|_| format!("{} expects a number, got '{}'", what, rest))
        };
        let required = |what: &str| -> std::result::Result<String, String> {
            if rest.is_empty() {
                Err(format!("{} expects an argument", what))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "p" | "play" | "pause" | "toggle" => Command::PlayPause,
            "s" | "stop" => Command::Stop,
            "n" | "next" => Command::Next,
            "b" | "prev" | "previous" => Command::Previous,
            "seek" => Command::Seek(parse_clock(rest)?),
            "vol" | "volume" => Command::SetVolume(number("volume")?.min(100) as u8),
            "mute" => Command::ToggleMute,
            "shuffle" => Command::ToggleShuffle,
            "repeat" => Command::CycleRepeat,
            "goto" => Command::PlayIndex(number("goto")?),
            "open" | "add" => Command::Open(vec![PathBuf::from(required("open")?)]),
            "rm" | "remove" => Command::Remove(
                rest.split_whitespace()
                    .map(|n| n.parse::<usize>().map_err(|_| format!("bad index '{}'", n)))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            "new" => Command::CreatePlaylist(required("new")?),
            "load" => Command::LoadPlaylist(PathBuf::from(required("load")?)),
            "save" => Command::SavePlaylist(PathBuf::from(required("save")?)),
            "scan" => Command::Scan(PathBuf::from(required("scan")?)),
            "cancel" => Command::CancelScan,
            "search" | "find" => Command::Search(rest.to_string()),
            "adopt" => Command::Adopt(number("adopt")?),
            "enqueue" => Command::Enqueue(rest.to_string()),
            "edit" => {
                let mut fields = rest.splitn(3, '|').map(str::trim);
                Command::EditMetadata {
                    title: fields.next().unwrap_or_default().to_string(),
                    artist: fields.next().unwrap_or_default().to_string(),
                    album: fields.next().unwrap_or_default().to_string(),
                }
            }
            "eq" => {
                let mut parts = rest.split_whitespace();
                let band = parts.next().and_then(|b| b.parse::<usize>().ok());
                let gain = parts.next().and_then(|g| g.parse::<i32>().ok());
                match (band, gain) {
                    (Some(band), Some(gain)) => Command::SetEqualizerBand { band, gain },
                    _ => return Err("eq expects <band> <gain>".to_string()),
                }
            }
            "preset" => Command::LoadPreset(required("preset")?),
            "savepreset" => Command::SavePreset(required("savepreset")?),
            "sleep" => Command::SetSleep(rest.parse::<SleepSetting>()?),
            "ls" | "list" => Command::ShowPlaylist,
            "status" | "st" => Command::Status,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(command)
    }
}

/// Seconds (`90`) or minutes and seconds (`1:30`) to milliseconds
fn parse_clock(text: &str) -> std::result::Result<u64, String> {
    let invalid = || format!("invalid time '{}'", text);
    let seconds = match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.trim().parse().map_err(|_| invalid())?;
            let seconds: u64 = seconds.trim().parse().map_err(|_| invalid())?;
            minutes * 60 + seconds
        }
        None => text.trim().parse().map_err(|_| invalid())?,
    };
    Ok(seconds * 1000)
}

/// Player-level notifications, alongside the session's own events
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Nothing queued to play; the caller should offer a file picker
    RequestFile,
    ScanStarted { root: PathBuf, total: usize },
    ScanProgress { processed: usize, total: usize, fraction: f32 },
    ScanFinished { tracks: usize, cancelled: bool },
    SleepExpired,
    PlaylistChanged { len: usize, cursor: Option<usize> },
    Message(String),
    Error(String),
}

pub type NoticeHandler = Box<dyn FnMut(&Notice)>;

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub default_volume: u8,
    pub auto_advance_on_error: bool,
    pub poll_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PlayerOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_volume: config.playback.default_volume.min(100),
            auto_advance_on_error: config.playback.auto_advance_on_error,
            poll_interval: config.playback.poll_interval(),
        }
    }
}

/// Single owner of the playback session, playlist and library.
///
/// Every mutation happens on the task running [`Player::run`]; the scanner
/// only talks back through its progress channel.
pub struct Player<E: MediaEngine, S: SettingsStore> {
    session: PlaybackSession<E>,
    playlist: PlaylistEngine,
    library: LibraryIndex,
    scanner: LibraryScanner,
    scan: Option<ScanHandle>,
    sleep: SleepTimer,
    equalizer: Equalizer,
    settings: S,
    options: PlayerOptions,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    listeners: Vec<NoticeHandler>,
}

impl<E: MediaEngine, S: SettingsStore> Player<E, S> {
    pub fn new(
        engine: E,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        store: S,
        scanner: LibraryScanner,
        options: PlayerOptions,
    ) -> Self {
        let volume = store
            .get_int(settings::VOLUME, i64::from(options.default_volume))
            .clamp(0, 100) as u8;
        let equalizer = Equalizer::restore(&store);
        debug!("Restored volume {} and equalizer {}", volume, equalizer.describe());

        Self {
            session: PlaybackSession::new(engine, volume),
            playlist: PlaylistEngine::new(),
            library: LibraryIndex::default(),
            scanner,
            scan: None,
            sleep: SleepTimer::new(),
            equalizer,
            settings: store,
            options,
            engine_events,
            listeners: Vec::new(),
        }
    }

    pub fn session(&self) -> &PlaybackSession<E> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession<E> {
        &mut self.session
    }

    pub fn playlist(&self) -> &PlaylistEngine {
        &self.playlist
    }

    pub fn library(&self) -> &LibraryIndex {
        &self.library
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    pub fn on_notice(&mut self, handler: impl FnMut(&Notice) + 'static) {
        self.listeners.push(Box::new(handler));
    }

    fn notify(&mut self, notice: Notice) {
        for listener in self.listeners.iter_mut() {
            listener(&notice);
        }
    }

    fn playlist_changed(&mut self) {
        let notice = Notice::PlaylistChanged {
            len: self.playlist.len(),
            cursor: self.playlist.cursor(),
        };
        self.notify(notice);
    }

    /// Drive the player until `Quit` or until every command sender is gone.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        let mut poll = tokio::time::interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Player loop started");

        loop {
            // Re-read every pass so a replaced or cancelled deadline is never awaited
            let deadline = self.sleep.deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.engine_events.recv() => self.handle_engine_event(event),
                progress = next_scan_event(&mut self.scan) => match progress {
                    Some(progress) => self.handle_scan_progress(progress),
                    None => self.notify(Notice::Error("Library scan ended without a result".to_string())),
                },
                _ = sleep_timer::wait_for(deadline) => self.check_sleep_timer(Instant::now()),
                _ = poll.tick() => self.session.poll_engine(),
            }
        }

        self.shutdown()
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::PlayPause => match self.session.play_pause(&mut self.playlist) {
                Ok(PlayPauseOutcome::RequestFile) => self.notify(Notice::RequestFile),
                Ok(_) => {}
                Err(e) => self.settle(Err(e)),
            },
            Command::Stop => self.session.stop(),
            Command::Next => {
                let result = self.session.next(&mut self.playlist);
                self.settle(result);
            }
            Command::Previous => {
                let result = self.session.previous(&mut self.playlist);
                self.settle(result);
            }
            Command::Seek(position_ms) => {
                self.session.seek(position_ms);
            }
            Command::SetVolume(volume) => self.session.set_volume(volume),
            Command::ToggleMute => {
                self.session.toggle_mute();
            }
            Command::ToggleShuffle => {
                self.playlist.toggle_shuffle();
                self.playlist_changed();
            }
            Command::CycleRepeat => {
                let mode = self.playlist.cycle_repeat();
                self.notify(Notice::Message(mode.to_string()));
            }
            Command::PlayIndex(index) => {
                let result = self
                    .session
                    .play_index(&mut self.playlist, index)
                    .map(|_| Transport::Playing(index));
                self.settle(result);
            }
            Command::Open(paths) => self.open(paths),
            Command::Remove(indices) => {
                self.playlist.remove_at(&indices);
                self.playlist_changed();
            }
            Command::CreatePlaylist(name) => {
                self.playlist.create(name);
                self.playlist_changed();
            }
            Command::LoadPlaylist(path) => self.load_playlist(&path),
            Command::SavePlaylist(path) => self.save_playlist(&path),
            Command::Scan(root) => self.start_scan(root),
            Command::CancelScan => {
                if let Some(scan) = &self.scan {
                    scan.cancel();
                }
            }
            Command::Search(query) => {
                let lines: Vec<String> = self
                    .library
                    .fuzzy_search(&query)
                    .iter()
                    .map(|(row, track)| describe_row(row, track))
                    .collect();
                self.notify(Notice::Message(format!("{} matches", lines.len())));
                for line in lines {
                    self.notify(Notice::Message(line));
                }
            }
            Command::Adopt(row) => self.adopt(row),
            Command::Enqueue(query) => {
                let tracks = self.library.search(&query).to_tracks();
                let added = tracks.len();
                self.playlist.append(tracks, false);
                info!("Queued {} library tracks", added);
                self.playlist_changed();
            }
            Command::EditMetadata {
                title,
                artist,
                album,
            } => {
                if !self
                    .session
                    .edit_metadata(&mut self.playlist, &title, &artist, &album)
                {
                    self.notify(Notice::Error("No track loaded to edit".to_string()));
                }
            }
            Command::SetEqualizerBand { band, gain } => {
                if self.equalizer.set_band(band, gain) {
                    self.notify(Notice::Message(self.equalizer.describe()));
                }
            }
            Command::LoadPreset(name) => {
                if self.equalizer.load_preset(&self.settings, &name) {
                    self.notify(Notice::Message(self.equalizer.describe()));
                } else {
                    self.notify(Notice::Error(format!("Unknown equalizer preset '{}'", name)));
                }
            }
            Command::SavePreset(name) => {
                if !self.equalizer.save_preset(&mut self.settings, &name) {
                    self.notify(Notice::Error("Preset name cannot be empty".to_string()));
                }
            }
            Command::SetSleep(setting) => {
                self.sleep.set(setting, Instant::now());
            }
            Command::ShowPlaylist => {
                let lines: Vec<String> = self
                    .playlist
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(i, track)| {
                        let marker = if Some(i) == self.playlist.cursor() { '>' } else { ' ' };
                        format!("{}{}", marker, describe_row(i, track))
                    })
                    .collect();
                for line in lines {
                    self.notify(Notice::Message(line));
                }
            }
            Command::Status => {
                let status = self.status_line();
                self.notify(Notice::Message(status));
            }
            Command::Quit => {}
        }
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if let Some(result) = self.session.handle_engine_event(event, &mut self.playlist) {
            self.settle(result);
        }
    }

    /// Apply the auto-advance policy after a playlist-driven transition.
    /// Each unplayable entry is skipped at most once per chain.
    fn settle(&mut self, mut result: Result<Transport>) {
        let mut attempts = 1;
        loop {
            match result {
                Ok(Transport::Playing(_)) | Ok(Transport::Cued(_)) | Ok(Transport::Restarted) => {
                    return
                }
                Ok(Transport::Stopped) => {
                    debug!("Reached the end of the playlist");
                    return;
                }
                Err(e @ PlayerError::LoadFailed { .. })
                    if self.options.auto_advance_on_error && attempts < self.playlist.len() =>
                {
                    warn!("{}; skipping to the next entry", e);
                    self.notify(Notice::Error(e.to_string()));
                    attempts += 1;
                    result = self.session.next(&mut self.playlist);
                }
                Err(PlayerError::EmptyPlaylist) => {
                    self.notify(Notice::RequestFile);
                    return;
                }
                Err(e) => {
                    self.recover(e);
                    return;
                }
            }
        }
    }

    fn recover(&mut self, e: PlayerError) {
        if e.is_recoverable() {
            warn!("{}", e);
        } else {
            error!("{}", e);
        }
        self.notify(Notice::Error(e.to_string()));
    }

    fn open(&mut self, paths: Vec<PathBuf>) {
        let tracks: Vec<Track> = paths.into_iter().map(Track::new).collect();
        if let Some(first) = tracks.first() {
            if let Some(parent) = first.file_path.parent() {
                self.settings
                    .set_string(settings::LAST_DIRECTORY, &parent.to_string_lossy());
            }
        }

        let auto_select = self.session.state() != crate::audio::PlaybackState::Playing;
        let selected = self.playlist.append(tracks, auto_select);
        self.playlist_changed();

        if let Some(index) = selected {
            let result = self
                .session
                .play_index(&mut self.playlist, index)
                .map(|_| Transport::Playing(index));
            self.settle(result);
        }
    }

    fn adopt(&mut self, row: usize) {
        let Some(track) = self.library.get(row).cloned() else {
            self.recover(PlayerError::OutOfRange {
                index: row,
                len: self.library.len(),
            });
            return;
        };

        let index = match self.playlist.position_of(&track.file_path) {
            Some(index) => index,
            None => {
                self.playlist.append(vec![track], false);
                self.playlist_changed();
                self.playlist.len() - 1
            }
        };

        let result = self
            .session
            .play_index(&mut self.playlist, index)
            .map(|_| Transport::Playing(index));
        self.settle(result);
    }

    fn load_playlist(&mut self, path: &Path) {
        match playlist_file::load(path) {
            Ok(paths) => {
                let tracks = paths.into_iter().map(Track::new).collect();
                self.playlist
                    .replace(tracks, Some(playlist_file::playlist_name(path)));
                info!("Loaded playlist {}", path.display());
                self.playlist_changed();
            }
            Err(e) => self.recover(e),
        }
    }

    fn save_playlist(&mut self, path: &Path) {
        let paths: Vec<&Path> = self
            .playlist
            .entries()
            .iter()
            .map(|t| t.file_path.as_path())
            .collect();
        if let Err(e) = playlist_file::save(path, &paths) {
            self.recover(e);
        }
    }

    fn start_scan(&mut self, root: PathBuf) {
        if let Some(previous) = self.scan.take() {
            info!("Replacing running scan");
            previous.cancel();
        }

        self.settings
            .set_string(settings::LAST_DIRECTORY, &root.to_string_lossy());
        self.scan = Some(self.scanner.spawn(root));
    }

    pub fn handle_scan_progress(&mut self, progress: ScanProgress) {
        let fraction = progress.fraction();
        match progress {
            ScanProgress::Started { root, total } => {
                self.notify(Notice::ScanStarted { root, total });
            }
            ScanProgress::TrackFound {
                processed, total, ..
            } => {
                self.notify(Notice::ScanProgress {
                    processed,
                    total,
                    fraction: fraction.unwrap_or(0.0),
                });
            }
            ScanProgress::Error { path, error } => {
                warn!("Scan error at {}: {}", path.display(), error);
            }
            ScanProgress::Finished(outcome) => {
                let cancelled = outcome.is_cancelled();
                let index = outcome.into_index();
                let tracks = index.len();
                self.library = index;
                self.scan = None;
                self.notify(Notice::ScanFinished { tracks, cancelled });
            }
        }
    }

    /// Stop playback if the sleep deadline has passed
    pub fn check_sleep_timer(&mut self, now: Instant) {
        if self.sleep.fire(now) {
            self.session.stop();
            self.notify(Notice::SleepExpired);
        }
    }

    fn status_line(&self) -> String {
        let track = self
            .session
            .current()
            .map(|t| format!("{} - {}", t.display_artist(), t.display_title()))
            .unwrap_or_else(|| "nothing".to_string());
        let sleep = self
            .sleep
            .remaining(Instant::now())
            .map(|d| format!(", sleep in {}", crate::audio::format_time(d.as_millis() as u64)))
            .unwrap_or_default();

        format!(
            "{:?}: {} [{} / {}] vol {}%{} | {} | {:?}{}",
            self.session.state(),
            track,
            crate::audio::format_time(self.session.position_ms()),
            crate::audio::format_time(self.session.duration_ms()),
            self.session.volume(),
            if self.session.is_muted() { " (muted)" } else { "" },
            self.playlist.repeat(),
            self.playlist.order(),
            sleep,
        )
    }

    /// Persist volume and equalizer, cancelling any scan still running
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(scan) = self.scan.take() {
            scan.cancel();
        }
        self.sleep.cancel();

        self.settings
            .set_int(settings::VOLUME, i64::from(self.session.volume()));
        self.equalizer.persist(&mut self.settings);
        self.settings.flush()?;
        info!("Player loop finished");
        Ok(())
    }
}

/// Next progress event of the running scan. Pending while none runs; a scan
/// whose channel closes early is cleared and reported as `None`.
async fn next_scan_event(scan: &mut Option<ScanHandle>) -> Option<ScanProgress> {
    let Some(handle) = scan.as_mut() else {
        return std::future::pending().await;
    };
    let event = handle.progress.recv().await;
    if event.is_none() {
        warn!("Scan task ended without reporting a result");
        *scan = None;
    }
    event
}

fn describe_row(row: usize, track: &Track) -> String {
    format!(
        "{:>3}. {} - {} ({}) {}",
        row,
        track.display_artist(),
        track.display_title(),
        track.display_album(),
        crate::audio::format_time(track.duration_ms())
    )
}
