use super::track::Track;
use crate::error::{PlayerError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Past this point into a track, "previous" restarts it instead of moving back
pub const RESTART_THRESHOLD_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayOrder {
    #[default]
    Sequential,
    Shuffled,
}

/// Traversal policy at playlist boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Off -> All -> One -> Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepeatMode::Off => "Repeat: Off",
            RepeatMode::All => "Repeat: All",
            RepeatMode::One => "Repeat: One",
        };
        f.write_str(label)
    }
}

/// Result of a forward step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved to this index
    Advanced(usize),
    /// Repeat-one: play the entry at the cursor again
    Replay(usize),
    /// Nothing further to play; cursor left where it was
    Stop,
}

/// Result of a backward step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    /// Position was past the restart threshold; cursor unchanged
    RestartCurrent,
    Moved(usize),
    /// Hit the front with repeat off; cursor clamped to 0
    Stop,
}

/// Ordered play queue with a cursor and traversal modes.
///
/// The cursor is either `None` or a valid index into the entries. Duplicate
/// paths are allowed and treated as distinct entries.
#[derive(Debug, Clone, Default)]
pub struct PlaylistEngine {
    entries: Vec<Track>,
    cursor: Option<usize>,
    order: PlayOrder,
    repeat: RepeatMode,
    name: Option<String>,
}

impl PlaylistEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Track] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        match self.cursor {
            Some(i) => self.entries.get_mut(i),
            None => None,
        }
    }

    pub fn order(&self) -> PlayOrder {
        self.order
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// First entry whose path matches
    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|t| t.file_path == path)
    }

    /// Add tracks to the end. With `auto_select` and an empty cursor, the
    /// first appended track becomes current and its index is returned.
    pub fn append(&mut self, tracks: Vec<Track>, auto_select: bool) -> Option<usize> {
        if tracks.is_empty() {
            return None;
        }

        let first_new = self.entries.len();
        let added = tracks.len();
        self.entries.extend(tracks);
        debug!("Appended {} tracks (playlist now {})", added, self.entries.len());

        if auto_select && self.cursor.is_none() {
            self.cursor = Some(first_new);
            return Some(first_new);
        }
        None
    }

    /// Remove the given positions. Out-of-range and repeated indices are
    /// ignored. A cursor past the new end is clamped to the last entry.
    pub fn remove_at(&mut self, indices: &[usize]) -> usize {
        let mut doomed: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.entries.len())
            .collect();
        doomed.sort_unstable();
        doomed.dedup();

        for &index in doomed.iter().rev() {
            self.entries.remove(index);
        }

        self.cursor = match self.cursor {
            _ if self.entries.is_empty() => None,
            Some(cursor) if cursor >= self.entries.len() => Some(self.entries.len() - 1),
            other => other,
        };

        if !doomed.is_empty() {
            debug!("Removed {} entries, cursor now {:?}", doomed.len(), self.cursor);
        }
        doomed.len()
    }

    /// Explicit jump, e.g. activating an entry
    pub fn set_cursor(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(PlayerError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.cursor = Some(index);
        Ok(())
    }

    /// User-requested step forward. Repeat-one does not pin manual skips.
    pub fn next(&mut self) -> Advance {
        let len = self.entries.len();
        if len == 0 {
            return Advance::Stop;
        }

        let candidate = self.cursor.map_or(0, |c| c + 1);
        if candidate < len {
            self.cursor = Some(candidate);
            return Advance::Advanced(candidate);
        }

        match self.repeat {
            RepeatMode::All => {
                self.cursor = Some(0);
                Advance::Advanced(0)
            }
            RepeatMode::Off | RepeatMode::One => {
                self.cursor = Some(len - 1);
                Advance::Stop
            }
        }
    }

    /// Step taken when the current track finishes on its own
    pub fn next_on_end(&mut self) -> Advance {
        match (self.repeat, self.cursor) {
            (RepeatMode::One, Some(cursor)) => Advance::Replay(cursor),
            _ => self.next(),
        }
    }

    /// Step backward given how far into the current track playback is
    pub fn previous(&mut self, position_ms: u64) -> Retreat {
        if position_ms > RESTART_THRESHOLD_MS && self.current().is_some() {
            return Retreat::RestartCurrent;
        }

        let len = self.entries.len();
        if len == 0 {
            return Retreat::Stop;
        }

        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                Retreat::Moved(cursor - 1)
            }
            _ if self.repeat == RepeatMode::All => {
                self.cursor = Some(len - 1);
                Retreat::Moved(len - 1)
            }
            _ => {
                self.cursor = Some(0);
                Retreat::Stop
            }
        }
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        info!("{}", self.repeat);
        self.repeat
    }

    pub fn toggle_shuffle(&mut self) -> PlayOrder {
        self.toggle_shuffle_with(&mut rand::thread_rng())
    }

    /// Enabling shuffle reorders the entries in place and keeps the current
    /// track selected. Disabling it leaves the shuffled order as is.
    pub fn toggle_shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> PlayOrder {
        match self.order {
            PlayOrder::Sequential => {
                self.shuffle_entries(rng);
                self.order = PlayOrder::Shuffled;
                info!("Shuffle on ({} entries)", self.entries.len());
            }
            PlayOrder::Shuffled => {
                self.order = PlayOrder::Sequential;
                info!("Shuffle off, keeping current order");
            }
        }
        self.order
    }

    fn shuffle_entries<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let len = self.entries.len();
        if len < 2 {
            return;
        }

        // Track the current entry by its slot through every swap so
        // duplicate paths cannot confuse the lookup afterwards
        let mut current = self.cursor;
        for i in (1..len).rev() {
            let j = rng.gen_range(0..=i);
            self.entries.swap(i, j);
            current = match current {
                Some(c) if c == i => Some(j),
                Some(c) if c == j => Some(i),
                other => other,
            };
        }
        self.cursor = current;
    }

    /// Start a new, empty, named playlist
    pub fn create(&mut self, name: impl Into<String>) {
        let name = name.into();
        info!("Created playlist '{}'", name);
        self.entries.clear();
        self.cursor = None;
        self.name = Some(name);
    }

    /// Swap in a loaded playlist wholesale; nothing is selected afterwards
    pub fn replace(&mut self, tracks: Vec<Track>, name: Option<String>) {
        self.entries = tracks;
        self.cursor = None;
        self.name = name;
    }
}
