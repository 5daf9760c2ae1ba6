// quaver - audio player core
// Playback state machine, playlist ordering and library scanning, driven by one owner loop

pub mod audio;       // tracks, engine boundary, scanner, playlist, session
pub mod config;      // config.toml
pub mod equalizer;   // band model and presets
pub mod error;
pub mod player;      // owner loop tying it all together
pub mod settings;    // persisted key-value store
pub mod sleep_timer;

pub use audio::{
    LibraryIndex, LibraryScanner, MediaEngine, MetadataProbe, PlaybackSession, PlaylistEngine,
    Track, TrackMetadata,
};
pub use config::Config;
pub use error::{PlayerError, Result};
pub use player::{Command, Notice, Player, PlayerOptions};
