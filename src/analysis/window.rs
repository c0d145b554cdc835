use serde::Deserialize;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::SpectroError;

/// Tapering applied to each analysis frame before the FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Bartlett,
    Rectangular,
}

impl WindowType {
    /// Window coefficients of length `size`.
    ///
    /// Cosine windows use the periodic (DFT-even) form.
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        if size == 1 {
            return vec![1.0];
        }
        let n = size as f32;
        (0..size)
            .map(|i| {
                let x = i as f32;
                match self {
                    WindowType::Hann => 0.5 - 0.5 * (2.0 * PI * x / n).cos(),
                    WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * x / n).cos(),
                    WindowType::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * x / n).cos() + 0.08 * (4.0 * PI * x / n).cos()
                    }
                    WindowType::Bartlett => 1.0 - ((2.0 * x - n) / n).abs(),
                    WindowType::Rectangular => 1.0,
                }
            })
            .collect()
    }
}

impl FromStr for WindowType {
    type Err = SpectroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            "bartlett" | "triangle" => Ok(WindowType::Bartlett),
            "rectangular" | "boxcar" => Ok(WindowType::Rectangular),
            other => Err(SpectroError::config(format!("unknown window type '{}'", other))),
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
            WindowType::Bartlett => "bartlett",
            WindowType::Rectangular => "rectangular",
        };
        f.write_str(name)
    }
}
