use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::normalize::NormalizationMode;
use crate::analysis::range::NumRange;
use crate::analysis::stft::StftParams;
use crate::analysis::window::WindowType;
use crate::error::{Result, SpectroError};
use crate::render::png::RenderSettings;
use crate::tiling::MAX_TILE_LEVELS;

pub const DEFAULT_NFFT: usize = 512;
pub const DEFAULT_WIN_SIZE: usize = 512;
pub const DEFAULT_OVERLAP: f32 = 90.0;
pub const DEFAULT_COLORMAP: &str = "greys";
pub const DEFAULT_TILE_LEVELS: u32 = 1;
pub const DEFAULT_HIGHPASS_ORDER: usize = 4;
// 1.3 x (1800 x 512)
pub const DEFAULT_WIDTH: u32 = 2340;
pub const DEFAULT_HEIGHT: u32 = 665;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub tiles: TilesSection,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisSection {
    #[serde(default = "default_nfft")]
    pub nfft: usize,
    #[serde(default = "default_win_size")]
    pub win_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: f32,
    #[serde(default)]
    pub window: WindowType,
    #[serde(default)]
    pub min_freq: Option<f32>,
    #[serde(default)]
    pub max_freq: Option<f32>,
    #[serde(default)]
    pub dyn_min_freq: Option<f32>,
    #[serde(default)]
    pub dyn_max_freq: Option<f32>,
    #[serde(default)]
    pub highpass_cutoff: f32,
    #[serde(default = "default_highpass_order")]
    pub highpass_order: usize,
    #[serde(default)]
    pub normalization: NormalizationMode,
    #[serde(default)]
    pub reference_level: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct RenderSection {
    #[serde(default = "default_colormap")]
    pub colormap: String,
    #[serde(default)]
    pub color_min: Option<f32>,
    #[serde(default)]
    pub color_max: Option<f32>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// One pixel per bin and frame, ignoring width/height.
    #[serde(default)]
    pub native_size: bool,
}

#[derive(Debug, Deserialize)]
pub struct TilesSection {
    #[serde(default = "default_tile_levels")]
    pub levels: u32,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            nfft: default_nfft(),
            win_size: default_win_size(),
            overlap: default_overlap(),
            window: WindowType::default(),
            min_freq: None,
            max_freq: None,
            dyn_min_freq: None,
            dyn_max_freq: None,
            highpass_cutoff: 0.0,
            highpass_order: default_highpass_order(),
            normalization: NormalizationMode::default(),
            reference_level: None,
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            colormap: default_colormap(),
            color_min: None,
            color_max: None,
            width: default_width(),
            height: default_height(),
            native_size: false,
        }
    }
}

impl Default for TilesSection {
    fn default() -> Self {
        Self {
            levels: default_tile_levels(),
            parallel: false,
        }
    }
}

fn default_nfft() -> usize { DEFAULT_NFFT }
fn default_win_size() -> usize { DEFAULT_WIN_SIZE }
fn default_overlap() -> f32 { DEFAULT_OVERLAP }
fn default_highpass_order() -> usize { DEFAULT_HIGHPASS_ORDER }
fn default_colormap() -> String { DEFAULT_COLORMAP.into() }
fn default_width() -> u32 { DEFAULT_WIDTH }
fn default_height() -> u32 { DEFAULT_HEIGHT }
fn default_tile_levels() -> u32 { DEFAULT_TILE_LEVELS }

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// `--config` if given, else `spectile.toml` in the working directory, else
/// the per-user config directory.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("spectile.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectile").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    /// The file's settings (defaults filled in) as an analysis configuration.
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let a = &self.analysis;
        let r = &self.render;
        Ok(AnalysisConfig {
            stft: StftParams {
                fft_size: a.nfft,
                window_size: a.win_size,
                overlap_pct: a.overlap,
                window: a.window,
            },
            freq_range: NumRange::new(a.min_freq, a.max_freq)?,
            dyn_range: NumRange::new(a.dyn_min_freq, a.dyn_max_freq)?,
            render: RenderSettings {
                colormap: r.colormap.parse()?,
                color_range: NumRange::new(r.color_min, r.color_max)?,
                size: if r.native_size { None } else { Some((r.width, r.height)) },
            },
            tile_levels: self.tiles.levels,
            highpass_cutoff: a.highpass_cutoff,
            highpass_order: a.highpass_order,
            normalization: a.normalization,
            reference_level: a.reference_level,
            parallel: self.tiles.parallel,
        })
    }
}

/// Everything one spectrogram run needs, validated and immutable.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub stft: StftParams,
    /// Frequencies drawn in the image.
    pub freq_range: NumRange,
    /// Frequencies that set the reference maximum; falls back to `freq_range`.
    pub dyn_range: NumRange,
    pub render: RenderSettings,
    pub tile_levels: u32,
    /// 0 disables the high-pass filter.
    pub highpass_cutoff: f32,
    pub highpass_order: usize,
    pub normalization: NormalizationMode,
    /// Fixed reference maximum; skips measuring one.
    pub reference_level: Option<f32>,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stft: StftParams {
                fft_size: DEFAULT_NFFT,
                window_size: DEFAULT_WIN_SIZE,
                overlap_pct: DEFAULT_OVERLAP,
                window: WindowType::Hann,
            },
            freq_range: NumRange::UNBOUNDED,
            dyn_range: NumRange::UNBOUNDED,
            render: RenderSettings {
                colormap: Default::default(),
                color_range: NumRange::UNBOUNDED,
                size: Some((DEFAULT_WIDTH, DEFAULT_HEIGHT)),
            },
            tile_levels: DEFAULT_TILE_LEVELS,
            highpass_cutoff: 0.0,
            highpass_order: DEFAULT_HIGHPASS_ORDER,
            normalization: NormalizationMode::Global,
            reference_level: None,
            parallel: false,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.stft.validate()?;
        if self.tile_levels == 0 || self.tile_levels > MAX_TILE_LEVELS {
            return Err(SpectroError::config(format!(
                "tile levels must be between 1 and {}, got {}",
                MAX_TILE_LEVELS, self.tile_levels
            )));
        }
        if !(self.highpass_cutoff >= 0.0) || !self.highpass_cutoff.is_finite() {
            return Err(SpectroError::config(format!(
                "high-pass cutoff must be a non-negative frequency, got {}",
                self.highpass_cutoff
            )));
        }
        if self.highpass_order == 0 {
            return Err(SpectroError::config("high-pass filter order must be positive"));
        }
        if let Some((w, h)) = self.render.size {
            if w == 0 || h == 0 {
                return Err(SpectroError::config(format!("image size {}x{} is empty", w, h)));
            }
        }
        if let Some(level) = self.reference_level {
            if !(level > 0.0) || !level.is_finite() {
                return Err(SpectroError::config(format!(
                    "reference level must be a positive finite number, got {}",
                    level
                )));
            }
        }
        Ok(())
    }

    /// Band the reference maximum is measured in.
    pub fn reference_band(&self) -> NumRange {
        if self.dyn_range.is_unbounded() {
            self.freq_range
        } else {
            self.dyn_range
        }
    }

    /// The plot band must keep at least one bin of the frequency axis at
    /// `sample_rate`.
    pub fn check_plot_band(&self, sample_rate: u32) -> Result<()> {
        let bin_width = sample_rate as f32 / self.stft.fft_size as f32;
        let any = (0..=self.stft.fft_size / 2).any(|j| self.freq_range.contains(j as f32 * bin_width));
        if any {
            Ok(())
        } else {
            Err(SpectroError::config(format!(
                "plot frequency range {} contains no bins between 0 and {} Hz",
                self.freq_range,
                sample_rate as f32 / 2.0
            )))
        }
    }
}
