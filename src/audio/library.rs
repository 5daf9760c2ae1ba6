use super::track::Track;
use fuzzy_matcher::{clangd::ClangdMatcher, FuzzyMatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable snapshot of one library scan.
///
/// Built fresh by every scan and never edited afterwards; clones share the
/// same track list. Search and filtering go through [`LibraryView`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryIndex {
    root: Option<PathBuf>,
    tracks: Arc<Vec<Track>>,
}

impl LibraryIndex {
    pub fn new(root: impl Into<PathBuf>, tracks: Vec<Track>) -> Self {
        Self {
            root: Some(root.into()),
            tracks: Arc::new(tracks),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, row: usize) -> Option<&Track> {
        self.tracks.get(row)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Every row, in scan order
    pub fn view(&self) -> LibraryView<'_> {
        LibraryView {
            index: self,
            rows: (0..self.tracks.len()).collect(),
        }
    }

    /// Case-insensitive substring match on title, artist or album.
    /// An empty query keeps every row.
    pub fn search(&self, query: &str) -> LibraryView<'_> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.view();
        }

        let rows = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| {
                [
                    track.display_title(),
                    track.display_artist(),
                    track.display_album(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            })
            .map(|(row, _)| row)
            .collect();

        LibraryView { index: self, rows }
    }

    /// Fuzzy match against "artist title album", best score first
    pub fn fuzzy_search(&self, query: &str) -> LibraryView<'_> {
        let query = query.trim();
        if query.is_empty() {
            return self.view();
        }

        let matcher = ClangdMatcher::default();
        let mut scored: Vec<(i64, usize)> = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(row, track)| {
                let haystack = format!(
                    "{} {} {}",
                    track.display_artist(),
                    track.display_title(),
                    track.display_album()
                );
                matcher.fuzzy_match(&haystack, query).map(|score| (score, row))
            })
            .collect();

        // Stable on ties so equal scores keep scan order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        LibraryView {
            index: self,
            rows: scored.into_iter().map(|(_, row)| row).collect(),
        }
    }
}

/// Read-only projection over a [`LibraryIndex`]
#[derive(Debug, Clone)]
pub struct LibraryView<'a> {
    index: &'a LibraryIndex,
    rows: Vec<usize>,
}

impl<'a> LibraryView<'a> {
    /// Row numbers into the underlying index
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Track)> + '_ {
        let index = self.index;
        self.rows
            .iter()
            .filter_map(move |&row| index.get(row).map(|track| (row, track)))
    }

    /// Owned copies, ready to hand to the playlist
    pub fn to_tracks(&self) -> Vec<Track> {
        self.iter().map(|(_, track)| track.clone()).collect()
    }
}
