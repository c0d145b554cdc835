use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpectroError};

/// Deepest zoom level accepted.
pub const MAX_TILE_LEVELS: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub level: u32,
    pub index: usize,
    pub start_sample: usize,
    pub end_sample: usize,
    pub time_start: f64,
    pub time_end: f64,
}

impl Tile {
    /// Tiles at this tile's level.
    pub fn zoom(&self) -> usize {
        1usize << self.level
    }

    pub fn samples(&self) -> Range<usize> {
        self.start_sample..self.end_sample
    }

    pub fn sample_count(&self) -> usize {
        self.end_sample - self.start_sample
    }

    /// `{zoom}_{index}`, unique across levels.
    pub fn identifier(&self) -> String {
        format!("{}_{}", self.zoom(), self.index)
    }

    /// `{base}_{zoom}_{index}.png` next to `output`.
    pub fn output_path(&self, output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!("{}_{}.png", stem, self.identifier()))
    }
}

/// Tiles for levels `0..levels`, coarsest first. Level `l` splits the samples
/// at `floor(t * N / 2^l)`, so every level partitions the buffer exactly.
pub fn plan(levels: u32, sample_count: usize, sample_rate: u32) -> Result<Vec<Tile>> {
    if levels == 0 {
        return Err(SpectroError::config("tile levels must be at least 1"));
    }
    if levels > MAX_TILE_LEVELS {
        return Err(SpectroError::config(format!(
            "{} tile levels exceeds the maximum of {}",
            levels, MAX_TILE_LEVELS
        )));
    }
    if sample_rate == 0 {
        return Err(SpectroError::config("sample rate must be positive"));
    }

    let rate = sample_rate as f64;
    let n = sample_count as u128;
    let mut tiles = Vec::with_capacity((1usize << levels) - 1);
    for level in 0..levels {
        let count = 1u128 << level;
        for index in 0..count {
            let start_sample = (index * n / count) as usize;
            let end_sample = ((index + 1) * n / count) as usize;
            tiles.push(Tile {
                level,
                index: index as usize,
                start_sample,
                end_sample,
                time_start: start_sample as f64 / rate,
                time_end: end_sample as f64 / rate,
            });
        }
    }
    Ok(tiles)
}

/// Fails on the first tile too short for one analysis window.
pub fn check_tile_lengths(tiles: &[Tile], window_size: usize) -> Result<()> {
    match tiles.iter().find(|t| t.sample_count() < window_size) {
        Some(tile) => Err(SpectroError::InsufficientData(format!(
            "tile {} (level {}, {:.3}s-{:.3}s) has {} samples, fewer than the window of {}",
            tile.identifier(),
            tile.level,
            tile.time_start,
            tile.time_end,
            tile.sample_count(),
            window_size
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn three_levels_make_seven_tiles() {
        let tiles = plan(3, 48000, 48000).unwrap();
        assert_eq!(tiles.len(), 7);
        let per_level: Vec<usize> = (0..3)
            .map(|l| tiles.iter().filter(|t| t.level == l).count())
            .collect();
        assert_eq!(per_level, vec![1, 2, 4]);
    }

    #[test]
    fn first_tile_is_full_duration() {
        let tiles = plan(4, 12345, 1000).unwrap();
        let first = tiles[0];
        assert_eq!((first.level, first.index), (0, 0));
        assert_eq!(first.samples(), 0..12345);
        assert!((first.time_end - 12.345).abs() < 1e-9);
    }

    #[test]
    fn identifiers_are_unique() {
        let tiles = plan(5, 100_000, 8000).unwrap();
        let mut ids: Vec<String> = tiles.iter().map(|t| t.identifier()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), tiles.len());
    }

    #[test]
    fn output_path_encodes_zoom_and_index() {
        let tiles = plan(2, 1000, 1000).unwrap();
        let out = Path::new("/tmp/spectros/dive.png");
        assert_eq!(tiles[0].output_path(out), PathBuf::from("/tmp/spectros/dive_1_0.png"));
        assert_eq!(tiles[2].output_path(out), PathBuf::from("/tmp/spectros/dive_2_1.png"));
    }

    #[test]
    fn rejects_zero_levels() {
        assert!(matches!(plan(0, 1000, 1000), Err(SpectroError::Config(_))));
    }

    #[test]
    fn short_tiles_fail_preflight() {
        let tiles = plan(3, 1000, 1000).unwrap();
        assert!(check_tile_lengths(&tiles, 250).is_ok());
        let err = check_tile_lengths(&tiles, 251).unwrap_err();
        assert!(matches!(err, SpectroError::InsufficientData(_)));
    }

    proptest! {
        #[test]
        fn levels_partition_the_recording(n in 0usize..1_000_000, levels in 1u32..8, rate in 1u32..192_000) {
            let tiles = plan(levels, n, rate).unwrap();
            for level in 0..levels {
                let row: Vec<&Tile> = tiles.iter().filter(|t| t.level == level).collect();
                prop_assert_eq!(row.len(), 1usize << level);
                prop_assert_eq!(row[0].start_sample, 0);
                prop_assert_eq!(row[row.len() - 1].end_sample, n);
                for pair in row.windows(2) {
                    prop_assert_eq!(pair[0].end_sample, pair[1].start_sample);
                    prop_assert_eq!(pair[0].index + 1, pair[1].index);
                }
                // Equal split up to one sample of rounding
                let lens: Vec<usize> = row.iter().map(|t| t.sample_count()).collect();
                let min = *lens.iter().min().unwrap();
                let max = *lens.iter().max().unwrap();
                prop_assert!(max - min <= 1);
            }
        }
    }
}
