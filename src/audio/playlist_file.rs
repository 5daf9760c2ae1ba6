// m3u / pls playlist files
// Only paths are stored; titles in .pls are regenerated from the filename on save

use super::track::file_stem;
use crate::error::{PlayerError, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Pls,
}

impl PlaylistFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("m3u") | Some("m3u8") => Ok(PlaylistFormat::M3u),
            Some("pls") => Ok(PlaylistFormat::Pls),
            _ => Err(PlayerError::UnsupportedPlaylistFormat(path.to_path_buf())),
        }
    }
}

pub fn render_m3u<P: AsRef<Path>>(paths: &[P]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for path in paths {
        let _ = writeln!(out, "{}", path.as_ref().display());
    }
    out
}

pub fn render_pls<P: AsRef<Path>>(paths: &[P]) -> String {
    let mut out = String::from("[playlist]\n");
    let _ = writeln!(out, "NumberOfEntries={}", paths.len());
    for (i, path) in paths.iter().enumerate() {
        let n = i + 1;
        let path = path.as_ref();
        let _ = writeln!(out, "File{}={}", n, path.display());
        let _ = writeln!(out, "Title{}={}", n, file_stem(path));
        // Durations are not computed at save time
        let _ = writeln!(out, "Length{}=-1", n);
    }
    out.push_str("Version=2\n");
    out
}

/// Entries of an m3u body. Blank lines and `#` lines are skipped.
pub fn parse_m3u(contents: &str) -> Vec<PathBuf> {
    content_lines(contents).map(PathBuf::from).collect()
}

/// `File<i>=` entries of a pls body, ordered by their index
pub fn parse_pls(contents: &str) -> Vec<PathBuf> {
    let mut entries: Vec<(usize, PathBuf)> = content_lines(contents)
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let index = key.trim().strip_prefix("File")?.parse::<usize>().ok()?;
            let value = value.trim();
            (!value.is_empty()).then(|| (index, PathBuf::from(value)))
        })
        .collect();
    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, path)| path).collect()
}

fn content_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Write `paths` in the format implied by the extension of `path`
pub fn save<P: AsRef<Path>>(path: &Path, paths: &[P]) -> Result<()> {
    let body = match PlaylistFormat::from_path(path)? {
        PlaylistFormat::M3u => render_m3u(paths),
        PlaylistFormat::Pls => render_pls(paths),
    };

    fs::write(path, body).map_err(|source| PlayerError::PlaylistIo {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Saved {} entries to {}", paths.len(), path.display());
    Ok(())
}

/// Read the entry paths of a playlist file. Relative entries are resolved
/// against the playlist's own directory.
pub fn load(path: &Path) -> Result<Vec<PathBuf>> {
    let format = PlaylistFormat::from_path(path)?;
    let contents = fs::read_to_string(path).map_err(|source| PlayerError::PlaylistIo {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = match format {
        PlaylistFormat::M3u => parse_m3u(&contents),
        PlaylistFormat::Pls => parse_pls(&contents),
    };

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let resolved: Vec<PathBuf> = entries
        .into_iter()
        .map(|entry| if entry.is_relative() { base.join(entry) } else { entry })
        .collect();

    debug!("Read {} entries from {}", resolved.len(), path.display());
    Ok(resolved)
}

/// Playlist display name: the file stem
pub fn playlist_name(path: &Path) -> String {
    file_stem(path)
}
