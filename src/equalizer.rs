// Ten-band equalizer model and presets
// Values are only stored and restored; no filter is applied to the audio

use crate::settings::{self, SettingsStore};
use tracing::{debug, info};

pub const BAND_COUNT: usize = 10;
pub const MIN_GAIN: i32 = -12;
pub const MAX_GAIN: i32 = 12;

pub const BAND_LABELS: [&str; BAND_COUNT] = [
    "60Hz", "170Hz", "310Hz", "600Hz", "1kHz", "3kHz", "6kHz", "12kHz", "14kHz", "16kHz",
];

pub type Bands = [i32; BAND_COUNT];

pub const BUILTIN_PRESETS: [(&str, Bands); 5] = [
    ("Flat", [0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
    ("Rock", [4, 3, 2, 0, -1, -1, 2, 3, 4, 4]),
    ("Pop", [-2, -1, 0, 2, 4, 4, 2, 0, -1, -2]),
    ("Jazz", [0, 0, 1, 3, 3, 3, 3, 1, 1, 1]),
    ("Classical", [5, 4, 3, 3, 0, 0, 0, 3, 4, 5]),
];

pub fn builtin_preset(name: &str) -> Option<Bands> {
    BUILTIN_PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|(_, bands)| *bands)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Equalizer {
    bands: Bands,
}

impl Equalizer {
    pub fn bands(&self) -> &Bands {
        &self.bands
    }

    /// Set one band, clamped to the gain range. Unknown bands are ignored.
    pub fn set_band(&mut self, band: usize, gain: i32) -> bool {
        match self.bands.get_mut(band) {
            Some(slot) => {
                *slot = gain.clamp(MIN_GAIN, MAX_GAIN);
                true
            }
            None => false,
        }
    }

    pub fn set_bands(&mut self, gains: &[i32]) {
        for (band, gain) in gains.iter().take(BAND_COUNT).enumerate() {
            self.set_band(band, *gain);
        }
    }

    /// Restore the last saved bands; anything missing stays flat
    pub fn restore(store: &dyn SettingsStore) -> Self {
        let mut eq = Self::default();
        if let Some(saved) = store.get_int_array(settings::EQUALIZER) {
            eq.set_bands(&saved);
        }
        eq
    }

    pub fn persist(&self, store: &mut dyn SettingsStore) {
        store.set_int_array(settings::EQUALIZER, &self.bands);
    }

    /// Store the current bands under a user preset name
    pub fn save_preset(&self, store: &mut dyn SettingsStore, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        store.set_int_array(&settings::preset_key(name), &self.bands);
        info!("Saved equalizer preset '{}'", name);
        true
    }

    /// Apply a built-in or stored preset. Unknown names leave the bands unchanged.
    pub fn load_preset(&mut self, store: &dyn SettingsStore, name: &str) -> bool {
        if let Some(bands) = builtin_preset(name) {
            self.bands = bands;
            debug!("Applied built-in equalizer preset '{}'", name);
            return true;
        }

        match store.get_int_array(&settings::preset_key(name)) {
            Some(saved) if saved.len() == BAND_COUNT => {
                self.set_bands(&saved);
                debug!("Applied stored equalizer preset '{}'", name);
                true
            }
            _ => {
                debug!("No equalizer preset named '{}'", name);
                false
            }
        }
    }

    /// `60Hz:+4 170Hz:+3 ...`
    pub fn describe(&self) -> String {
        BAND_LABELS
            .iter()
            .zip(self.bands.iter())
            .map(|(label, gain)| format!("{}:{:+}", label, gain))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn bands_are_clamped() {
        let mut eq = Equalizer::default();
        assert!(eq.set_band(0, 40));
        assert!(eq.set_band(9, -99));
        assert!(!eq.set_band(10, 1));
        assert_eq!(eq.bands()[0], MAX_GAIN);
        assert_eq!(eq.bands()[9], MIN_GAIN);
    }

    #[test]
    fn builtin_presets_load_by_name() {
        let store = MemorySettings::new();
        let mut eq = Equalizer::default();

        assert!(eq.load_preset(&store, "Rock"));
        assert_eq!(eq.bands(), &[4, 3, 2, 0, -1, -1, 2, 3, 4, 4]);
        assert!(eq.load_preset(&store, "classical"));
        assert_eq!(eq.bands()[0], 5);
    }

    #[test]
    fn every_builtin_preset_stays_in_range() {
        for (name, bands) in BUILTIN_PRESETS {
            assert!(bands.iter().all(|g| (MIN_GAIN..=MAX_GAIN).contains(g)), "{name}");
        }
    }

    #[test]
    fn user_presets_round_trip_through_the_store() {
        let mut store = MemorySettings::new();
        let mut eq = Equalizer::default();
        eq.set_bands(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(eq.save_preset(&mut store, "Mine"));
        assert!(!eq.save_preset(&mut store, "  "));

        let mut other = Equalizer::default();
        assert!(other.load_preset(&store, "Mine"));
        assert_eq!(other, eq);
    }

    #[test]
    fn unknown_preset_leaves_bands_alone() {
        let store = MemorySettings::new();
        let mut eq = Equalizer::default();
        eq.set_band(3, 6);
        assert!(!eq.load_preset(&store, "Nope"));
        assert_eq!(eq.bands()[3], 6);
    }

    #[test]
    fn restore_reads_the_saved_bands() {
        let mut store = MemorySettings::new();
        let mut eq = Equalizer::default();
        eq.set_band(4, -3);
        eq.persist(&mut store);

        assert_eq!(Equalizer::restore(&store), eq);
        assert!(Equalizer::restore(&store).describe().contains("1kHz:-3"));
    }
}
