use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::analysis::normalize::{NormalizationMode, NormalizationState};
use crate::analysis::stft::{self, Spectrogram};
use crate::audio::decode::SampleBuffer;
use crate::audio::highpass;
use crate::config::AnalysisConfig;
use crate::error::{Result, SpectroError};
use crate::render::png;
use crate::tiling::{self, Tile};

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// Shared reference, unless every tile measured its own.
    pub reference: Option<NormalizationState>,
}

/// Computes the dB spectrogram of one tile.
///
/// With `state` set the tile is measured against it; otherwise its own
/// reference band seeds a new state. The state used is returned so the caller
/// can hand it to the next tile.
pub fn analyze_tile(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
    tile: &Tile,
    state: Option<NormalizationState>,
) -> Result<(Spectrogram, NormalizationState)> {
    let power = stft::compute(&samples[tile.samples()], sample_rate, &config.stft)?
        .offset_times(tile.time_start as f32);

    let state = match state {
        Some(state) => state,
        None => NormalizationState::from_reference(&power, &config.reference_band())?,
    };

    let plotted = power.restrict(&config.freq_range);
    log::debug!(
        "Tile {}: {} frames x {} bins, {:.3}s-{:.3}s, reference {:.3e}",
        tile.identifier(),
        plotted.n_frames(),
        plotted.n_freqs(),
        tile.time_start,
        tile.time_end,
        state.reference_max()
    );
    Ok((state.to_db(&plotted), state))
}

/// Where each tile's image goes. A single-level run writes `output` itself.
pub fn tile_path(output: &Path, tile: &Tile, levels: u32) -> PathBuf {
    if levels == 1 {
        output.to_path_buf()
    } else {
        tile.output_path(output)
    }
}

/// Renders every tile of `audio` under `output`.
///
/// All configuration and tile lengths are checked before the first image is
/// written.
pub fn run(
    audio: &SampleBuffer,
    config: &AnalysisConfig,
    output: &Path,
    progress: Option<&ProgressBar>,
) -> Result<RunSummary> {
    config.validate()?;
    config.check_plot_band(audio.sample_rate)?;

    let tiles = tiling::plan(config.tile_levels, audio.samples.len(), audio.sample_rate)?;
    tiling::check_tile_lengths(&tiles, config.stft.window_size)?;

    let filtered;
    let samples: &[f32] = if config.highpass_cutoff > 0.0 {
        filtered = highpass::highpass(
            &audio.samples,
            config.highpass_cutoff,
            audio.sample_rate,
            config.highpass_order,
        )?;
        &filtered
    } else {
        &audio.samples
    };

    log::info!(
        "Rendering {} tile(s) over {} level(s), normalization={}",
        tiles.len(),
        config.tile_levels,
        match config.reference_level {
            Some(level) => format!("fixed {:.3e}", level),
            None => config.normalization.to_string(),
        }
    );

    let fixed = config.reference_level.map(NormalizationState::fixed).transpose()?;

    let render = |tile: &Tile, state: Option<NormalizationState>| -> Result<(PathBuf, NormalizationState)> {
        let (db, used) = analyze_tile(samples, audio.sample_rate, config, tile, state)?;
        let path = tile_path(output, tile, config.tile_levels);
        png::render_to_file(&db, &config.render, &path)?;
        if let Some(pb) = progress {
            pb.inc(1);
        }
        Ok((path, used))
    };

    // The full-duration tile goes first: under global normalization it seeds
    // the reference every other tile reuses.
    let (first, rest) = tiles
        .split_first()
        .ok_or_else(|| SpectroError::config("no tiles to render"))?;
    let (first_path, first_state) = render(first, fixed)?;

    let shared = match (fixed, config.normalization) {
        (Some(state), _) => Some(state),
        (None, NormalizationMode::Global) => Some(first_state),
        (None, NormalizationMode::PerTile) => None,
    };

    let rest_paths: Vec<PathBuf> = if config.parallel {
        rest.par_iter()
            .map(|tile| render(tile, shared).map(|(path, _)| path))
            .collect::<Result<_>>()?
    } else {
        rest.iter()
            .map(|tile| render(tile, shared).map(|(path, _)| path))
            .collect::<Result<_>>()?
    };

    let mut written = Vec::with_capacity(tiles.len());
    written.push(first_path);
    written.extend(rest_paths);

    Ok(RunSummary {
        written,
        reference: shared,
    })
}
