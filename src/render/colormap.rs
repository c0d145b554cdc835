use std::fmt;
use std::str::FromStr;

use crate::analysis::normalize::DB_FLOOR;
use crate::analysis::range::NumRange;
use crate::error::SpectroError;

/// Palettes available for spectrogram images, named as in matplotlib.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Colormap {
    /// White for quiet, black for loud.
    #[default]
    Greys,
    /// Black for quiet, white for loud.
    Gray,
    Viridis,
    Magma,
    Inferno,
    Plasma,
    Cividis,
    Turbo,
}

impl Colormap {
    /// RGB for a position in `[0, 1]`; out-of-range input is clamped.
    pub fn color(self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) as f64 };
        let c = match self {
            Colormap::Greys => colorous::GREYS.eval_continuous(t),
            Colormap::Gray => colorous::GREYS.eval_continuous(1.0 - t),
            Colormap::Viridis => colorous::VIRIDIS.eval_continuous(t),
            Colormap::Magma => colorous::MAGMA.eval_continuous(t),
            Colormap::Inferno => colorous::INFERNO.eval_continuous(t),
            Colormap::Plasma => colorous::PLASMA.eval_continuous(t),
            Colormap::Cividis => colorous::CIVIDIS.eval_continuous(t),
            Colormap::Turbo => colorous::TURBO.eval_continuous(t),
        };
        [c.r, c.g, c.b]
    }
}

impl FromStr for Colormap {
    type Err = SpectroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greys" => Ok(Colormap::Greys),
            "gray" | "grey" => Ok(Colormap::Gray),
            "viridis" => Ok(Colormap::Viridis),
            "magma" => Ok(Colormap::Magma),
            "inferno" => Ok(Colormap::Inferno),
            "plasma" => Ok(Colormap::Plasma),
            "cividis" => Ok(Colormap::Cividis),
            "turbo" => Ok(Colormap::Turbo),
            other => Err(SpectroError::config(format!("unknown colormap '{}'", other))),
        }
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Colormap::Greys => "greys",
            Colormap::Gray => "gray",
            Colormap::Viridis => "viridis",
            Colormap::Magma => "magma",
            Colormap::Inferno => "inferno",
            Colormap::Plasma => "plasma",
            Colormap::Cividis => "cividis",
            Colormap::Turbo => "turbo",
        })
    }
}

/// Linear map from dB values onto the colormap domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub lo: f32,
    pub hi: f32,
}

impl ColorScale {
    /// Fills unset bounds of `range` with the extremes of `values`, ignoring
    /// cells on the dB floor.
    pub fn resolve(range: &NumRange, values: &[f32]) -> Self {
        let (data_lo, data_hi) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > DB_FLOOR)
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let data_lo = if data_lo.is_finite() { data_lo } else { 0.0 };
        let data_hi = if data_hi.is_finite() { data_hi } else { 0.0 };
        // An open bound never crosses the fixed one.
        let (lo, hi) = match (range.min(), range.max()) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, data_hi.max(lo)),
            (None, Some(hi)) => (data_lo.min(hi), hi),
            (None, None) => (data_lo, data_hi),
        };
        if range.min().is_some_and(|lo| lo > data_hi) || range.max().is_some_and(|hi| hi < data_lo) {
            log::warn!(
                "Color range {} lies outside the data ({:.1} to {:.1} dB); the image will be flat",
                range,
                data_lo,
                data_hi
            );
        }
        Self { lo, hi }
    }

    /// Position of `value` in `[0, 1]`. A collapsed scale maps values above it
    /// to 1 and everything else to 0.
    pub fn position(&self, value: f32) -> f32 {
        if self.hi <= self.lo {
            return if value > self.hi { 1.0 } else { 0.0 };
        }
        ((value - self.lo) / (self.hi - self.lo)).clamp(0.0, 1.0)
    }
}
