use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpectroError};

/// A closed numeric interval where either bound may be open-ended.
///
/// Parsed from `"MIN:MAX"`, `"MIN:"` or `":MAX"`. `min <= max` holds whenever
/// both bounds are present.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumRange {
    min: Option<f32>,
    max: Option<f32>,
}

impl NumRange {
    pub const UNBOUNDED: NumRange = NumRange { min: None, max: None };

    pub fn new(min: Option<f32>, max: Option<f32>) -> Result<Self> {
        for bound in [min, max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(SpectroError::config(format!("range bound {} is not finite", bound)));
            }
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(SpectroError::config(format!(
                    "range minimum {} is greater than maximum {}",
                    lo, hi
                )));
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Option<f32> {
        self.min
    }

    pub fn max(&self) -> Option<f32> {
        self.max
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min.map_or(true, |lo| value >= lo) && self.max.map_or(true, |hi| value <= hi)
    }
}

impl FromStr for NumRange {
    type Err = SpectroError;

    fn from_str(s: &str) -> Result<Self> {
        let (lo, hi) = s
            .split_once(':')
            .ok_or_else(|| SpectroError::config(format!("range '{}' must look like MIN:MAX", s)))?;

        let parse_bound = |part: &str| -> Result<Option<f32>> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<f32>()
                .map(Some)
                .map_err(|_| SpectroError::config(format!("invalid range bound '{}' in '{}'", part, s)))
        };

        NumRange::new(parse_bound(lo)?, parse_bound(hi)?)
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Some(lo) => write!(f, "{}:", lo)?,
            None => f.write_str(":")?,
        }
        if let Some(hi) = self.max {
            write!(f, "{}", hi)?;
        }
        Ok(())
    }
}
