use std::f64::consts::PI;

use crate::error::{Result, SpectroError};

/// One section in transposed direct form II, `a0 == 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// First-order high-pass, `k = tan(pi * fc / fs)`.
    fn first_order_highpass(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b0: norm,
            b1: -norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    fn second_order_highpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self {
            b0: norm,
            b1: -2.0 * norm,
            b2: norm,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Delay-line state after a constant input `x` has settled.
    fn steady_state(&self, x: f64) -> [f64; 2] {
        let y = self.dc_gain() * x;
        [y - self.b0 * x, self.b2 * x - self.a2 * y]
    }
}

/// A Butterworth high-pass of arbitrary order.
#[derive(Clone, Debug)]
pub struct Butterworth {
    sections: Vec<BiquadCoeffs>,
}

impl Butterworth {
    /// Designs the filter. `cutoff / (0.5 * sample_rate)` must lie in `(0, 1)`.
    pub fn highpass(order: usize, cutoff: f32, sample_rate: u32) -> Result<Self> {
        if order == 0 {
            return Err(SpectroError::config("high-pass filter order must be positive"));
        }
        if sample_rate == 0 {
            return Err(SpectroError::config("sample rate must be positive"));
        }
        let normalized = cutoff as f64 / (0.5 * sample_rate as f64);
        if !(normalized > 0.0 && normalized < 1.0) {
            return Err(SpectroError::config(format!(
                "high-pass cutoff {} Hz must lie strictly between 0 and the Nyquist frequency {} Hz",
                cutoff,
                sample_rate as f64 / 2.0
            )));
        }

        let k = (PI * normalized / 2.0).tan();
        let mut sections: Vec<BiquadCoeffs> = (0..order / 2)
            .map(|i| {
                let angle = PI * (2 * i + 1) as f64 / (2 * order) as f64;
                let q = 1.0 / (2.0 * angle.sin());
                BiquadCoeffs::second_order_highpass(k, q)
            })
            .collect();
        if order % 2 == 1 {
            sections.push(BiquadCoeffs::first_order_highpass(k));
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    fn pad_len(&self, len: usize) -> usize {
        (3 * (2 * self.sections.len() + 1)).min(len.saturating_sub(1))
    }

    /// Single causal pass, starting from the steady state of `data[0]`.
    fn filter_in_place(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };

        let mut states: Vec<[f64; 2]> = Vec::with_capacity(self.sections.len());
        let mut level = first;
        for section in &self.sections {
            states.push(section.steady_state(level));
            level *= section.dc_gain();
        }

        for sample in data.iter_mut() {
            let mut x = *sample;
            for (c, z) in self.sections.iter().zip(states.iter_mut()) {
                let y = c.b0 * x + z[0];
                z[0] = c.b1 * x - c.a1 * y + z[1];
                z[1] = c.b2 * x - c.a2 * y;
                x = y;
            }
            *sample = x;
        }
    }

    /// Zero-phase forward-backward pass over an odd-reflected extension.
    pub fn filtfilt(&self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = self.pad_len(n);

        let x: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let first = x[0];
        let last = x[n - 1];

        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(&x);
        ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));

        self.filter_in_place(&mut ext);
        ext.reverse();
        self.filter_in_place(&mut ext);
        ext.reverse();

        ext[pad..pad + n].iter().map(|&v| v as f32).collect()
    }
}

/// Attenuates content below `cutoff` Hz. A cutoff of 0 returns the samples
/// unchanged.
pub fn highpass(samples: &[f32], cutoff: f32, sample_rate: u32, order: usize) -> Result<Vec<f32>> {
    if cutoff == 0.0 {
        return Ok(samples.to_vec());
    }
    if cutoff < 0.0 || !cutoff.is_finite() {
        return Err(SpectroError::config(format!(
            "high-pass cutoff must be a non-negative frequency, got {}",
            cutoff
        )));
    }
    let filter = Butterworth::highpass(order, cutoff, sample_rate)?;
    log::info!(
        "High-pass filtering at {} Hz (order {}, {} sections)",
        cutoff,
        order,
        filter.sections().len()
    );
    Ok(filter.filtfilt(samples))
}
