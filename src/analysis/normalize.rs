use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use super::range::NumRange;
use super::stft::Spectrogram;
use crate::error::{Result, SpectroError};

/// Lowest level a normalized value can take: the dB of the smallest positive
/// normal `f32` ratio.
pub const DB_FLOOR: f32 = -379.0;

/// How tiles obtain the reference their power is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// The full-duration tile seeds the reference and every tile reuses it.
    #[default]
    Global,
    /// Each tile derives its reference from its own spectrogram.
    PerTile,
}

impl FromStr for NormalizationMode {
    type Err = SpectroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "global" => Ok(NormalizationMode::Global),
            "per_tile" | "tile" => Ok(NormalizationMode::PerTile),
            other => Err(SpectroError::config(format!(
                "unknown normalization mode '{}' (expected global or per_tile)",
                other
            ))),
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NormalizationMode::Global => "global",
            NormalizationMode::PerTile => "per_tile",
        })
    }
}

/// The power level that maps to 0 dB.
///
/// Established once per run and handed to every tile so their brightness is
/// comparable across zoom levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationState {
    reference_max: f32,
}

impl NormalizationState {
    /// Uses the loudest bin of `spectrogram` inside `band` as the reference.
    pub fn from_reference(spectrogram: &Spectrogram, band: &NumRange) -> Result<Self> {
        let restricted = spectrogram.restrict(band);
        let max = restricted.max().ok_or_else(|| {
            SpectroError::DegenerateSignal(format!(
                "no frequency bins inside reference band {}",
                band
            ))
        })?;
        if !(max > 0.0) || !max.is_finite() {
            return Err(SpectroError::DegenerateSignal(format!(
                "reference band {} has no positive energy (max {})",
                band, max
            )));
        }
        log::debug!("Reference maximum {:.3e} from band {}", max, band);
        Ok(Self { reference_max: max })
    }

    /// A caller-chosen reference; skips any measurement.
    pub fn fixed(reference_max: f32) -> Result<Self> {
        if !(reference_max > 0.0) || !reference_max.is_finite() {
            return Err(SpectroError::config(format!(
                "reference level must be a positive finite number, got {}",
                reference_max
            )));
        }
        Ok(Self { reference_max })
    }

    pub fn reference_max(&self) -> f32 {
        self.reference_max
    }

    /// `10 * log10(value / reference_max)` for every cell, floored at
    /// [`DB_FLOOR`].
    pub fn to_db(&self, spectrogram: &Spectrogram) -> Spectrogram {
        let reference = self.reference_max;
        spectrogram.map_values(|v| {
            let ratio = v / reference;
            if ratio.is_nan() || ratio < f32::MIN_POSITIVE {
                DB_FLOOR
            } else {
                (10.0 * ratio.log10()).max(DB_FLOOR)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrogram() -> Spectrogram {
        // 3 bins (0, 10, 20 Hz) x 2 frames
        Spectrogram::from_parts(
            vec![1.0, 2.0, 4.0, 8.0, 0.5, 0.0],
            vec![0.0, 10.0, 20.0],
            vec![0.1, 0.2],
        )
    }

    #[test]
    fn reference_band_normalizes_to_zero_db() {
        let spec = spectrogram();
        let state = NormalizationState::from_reference(&spec, &NumRange::UNBOUNDED).unwrap();
        assert_eq!(state.reference_max(), 8.0);
        let db = state.to_db(&spec);
        let max = db.max().unwrap();
        assert!(max.abs() < 1e-6);
        assert!((db.get(1, 0) - 10.0 * 0.5f32.log10()).abs() < 1e-5);
    }

    #[test]
    fn sub_band_reference_allows_positive_db_elsewhere() {
        let spec = spectrogram();
        let band = NumRange::new(Some(15.0), None).unwrap();
        let state = NormalizationState::from_reference(&spec, &band).unwrap();
        assert_eq!(state.reference_max(), 0.5);

        let reference_db = state.to_db(&spec.restrict(&band));
        assert!(reference_db.max().unwrap().abs() < 1e-6);
        // Louder bins outside the reference band exceed 0 dB
        assert!(state.to_db(&spec).get(1, 1) > 0.0);
    }

    #[test]
    fn zero_power_is_floored() {
        let spec = spectrogram();
        let state = NormalizationState::fixed(1.0).unwrap();
        let db = state.to_db(&spec);
        assert_eq!(db.get(2, 1), DB_FLOOR);
        assert!(db.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_band_is_degenerate() {
        let spec = spectrogram();
        let band = NumRange::new(Some(100.0), Some(200.0)).unwrap();
        let err = NormalizationState::from_reference(&spec, &band).unwrap_err();
        assert!(matches!(err, SpectroError::DegenerateSignal(_)));
    }

    #[test]
    fn silent_band_is_degenerate() {
        let spec = Spectrogram::from_parts(vec![0.0; 4], vec![0.0, 1.0], vec![0.0, 1.0]);
        let err = NormalizationState::from_reference(&spec, &NumRange::UNBOUNDED).unwrap_err();
        assert!(matches!(err, SpectroError::DegenerateSignal(_)));
    }

    #[test]
    fn fixed_reference_must_be_positive() {
        assert!(NormalizationState::fixed(0.0).is_err());
        assert!(NormalizationState::fixed(-1.0).is_err());
        assert!(NormalizationState::fixed(f32::NAN).is_err());
        assert_eq!(NormalizationState::fixed(2.5).unwrap().reference_max(), 2.5);
    }

    #[test]
    fn parses_modes() {
        assert_eq!("per-tile".parse::<NormalizationMode>().unwrap(), NormalizationMode::PerTile);
        assert_eq!("GLOBAL".parse::<NormalizationMode>().unwrap(), NormalizationMode::Global);
        assert!("loudest".parse::<NormalizationMode>().is_err());
    }
}
