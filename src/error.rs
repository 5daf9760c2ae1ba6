// Error taxonomy for the player core
// Anything the UI can recover from lives here; app-level plumbing uses anyhow

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// The media engine could not open or decode a source. Recoverable.
    #[error("failed to load '{}': {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    /// A cursor or index request outside the playlist. Nothing was mutated.
    #[error("index {index} out of range for playlist of {len} entries")]
    OutOfRange { index: usize, len: usize },

    /// Transport command with nothing queued
    #[error("playlist is empty")]
    EmptyPlaylist,

    #[error("playlist file '{}': {source}", path.display())]
    PlaylistIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported playlist format: '{}'", .0.display())]
    UnsupportedPlaylistFormat(PathBuf),

    #[error("settings store: {0}")]
    Settings(String),
}

impl PlayerError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlayerError::LoadFailed { .. } | PlayerError::EmptyPlaylist)
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
