use clap::Parser;
use std::path::PathBuf;

use crate::analysis::range::NumRange;
use crate::config::{
    AnalysisConfig, DEFAULT_COLORMAP, DEFAULT_HEIGHT, DEFAULT_HIGHPASS_ORDER, DEFAULT_NFFT,
    DEFAULT_OVERLAP, DEFAULT_TILE_LEVELS, DEFAULT_WIDTH, DEFAULT_WIN_SIZE,
};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "spectile", about = "Generates png spectrograms (and zoom tiles) from wav recordings")]
pub struct Cli {
    /// Input audio file (.wav)
    pub audio_file: PathBuf,

    /// Output png path (defaults to the input path with a .png extension)
    pub output: Option<PathBuf>,

    /// FFT length in samples
    #[arg(short, long, default_value_t = DEFAULT_NFFT)]
    pub nfft: usize,

    /// Analysis window length in samples
    #[arg(short, long, default_value_t = DEFAULT_WIN_SIZE)]
    pub win_size: usize,

    /// Overlap between consecutive windows, in percent [0, 100)
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    pub overlap: f32,

    /// Window function (hann, hamming, blackman, bartlett, rectangular)
    #[arg(long, default_value = "hann")]
    pub window: String,

    /// Plotted frequency range in Hz, as MIN:MAX, MIN: or :MAX
    #[arg(short, long)]
    pub freq_range: Option<String>,

    /// Frequency range in Hz that sets the loudness reference (defaults to --freq-range)
    #[arg(short, long)]
    pub dyn_range: Option<String>,

    /// Absolute color scale in dB, as MIN:MAX, MIN: or :MAX
    #[arg(long, allow_hyphen_values = true)]
    pub color_range: Option<String>,

    /// Colormap (greys, gray, viridis, magma, inferno, plasma, cividis, turbo)
    #[arg(short, long, default_value = DEFAULT_COLORMAP)]
    pub cmap: String,

    /// Number of zoom levels; level l is split into 2^l tiles
    #[arg(short, long, default_value_t = DEFAULT_TILE_LEVELS)]
    pub tile_levels: u32,

    /// High-pass cutoff in Hz applied before analysis (0 disables)
    #[arg(long, default_value_t = 0.0)]
    pub highpass: f32,

    /// Butterworth order of the high-pass filter
    #[arg(long, default_value_t = DEFAULT_HIGHPASS_ORDER)]
    pub highpass_order: usize,

    /// Loudness reference policy: global (shared across tiles) or per_tile
    #[arg(long, default_value = "global")]
    pub normalization: String,

    /// Fixed power reference for 0 dB instead of measuring one
    #[arg(long)]
    pub reference_level: Option<f32>,

    /// Image width in pixels
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// One pixel per frame and frequency bin, ignoring --width/--height
    #[arg(long)]
    pub native_size: bool,

    /// Render tiles after the reference tile in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.audio_file.with_extension("png"))
    }

    /// Applies flags over `base`. A flag left at its default keeps the value
    /// from `base`, so config files only lose to options given explicitly.
    pub fn overlay(&self, mut base: AnalysisConfig) -> Result<AnalysisConfig> {
        if self.nfft != DEFAULT_NFFT { base.stft.fft_size = self.nfft; }
        if self.win_size != DEFAULT_WIN_SIZE { base.stft.window_size = self.win_size; }
        if self.overlap != DEFAULT_OVERLAP { base.stft.overlap_pct = self.overlap; }
        if self.window != "hann" { base.stft.window = self.window.parse()?; }
        if let Some(ref range) = self.freq_range {
            base.freq_range = range.parse::<NumRange>()?;
        }
        if let Some(ref range) = self.dyn_range {
            base.dyn_range = range.parse::<NumRange>()?;
        }
        if let Some(ref range) = self.color_range {
            base.render.color_range = range.parse::<NumRange>()?;
        }
        if self.cmap != DEFAULT_COLORMAP { base.render.colormap = self.cmap.parse()?; }
        if self.tile_levels != DEFAULT_TILE_LEVELS { base.tile_levels = self.tile_levels; }
        if self.highpass != 0.0 { base.highpass_cutoff = self.highpass; }
        if self.highpass_order != DEFAULT_HIGHPASS_ORDER { base.highpass_order = self.highpass_order; }
        if self.normalization != "global" { base.normalization = self.normalization.parse()?; }
        if self.reference_level.is_some() { base.reference_level = self.reference_level; }
        if self.native_size {
            base.render.size = None;
        } else if self.width != DEFAULT_WIDTH || self.height != DEFAULT_HEIGHT {
            let (w, h) = base.render.size.unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));
            base.render.size = Some((
                if self.width != DEFAULT_WIDTH { self.width } else { w },
                if self.height != DEFAULT_HEIGHT { self.height } else { h },
            ));
        }
        if self.parallel { base.parallel = true; }
        base.validate()?;
        Ok(base)
    }
}
