use rustfft::{num_complex::Complex, FftPlanner};

use super::range::NumRange;
use super::window::WindowType;
use crate::error::{Result, SpectroError};

/// Frame layout of a short-time Fourier transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StftParams {
    pub fft_size: usize,
    pub window_size: usize,
    pub overlap_pct: f32,
    pub window: WindowType,
}

impl StftParams {
    /// Samples shared by consecutive frames.
    pub fn noverlap(&self) -> usize {
        (self.window_size as f64 * self.overlap_pct as f64 / 100.0).floor() as usize
    }

    /// Stride between frame starts.
    pub fn step(&self) -> Result<usize> {
        let noverlap = self.noverlap();
        if noverlap >= self.window_size {
            return Err(SpectroError::config(format!(
                "overlap of {}% leaves no hop between frames of {} samples",
                self.overlap_pct, self.window_size
            )));
        }
        Ok(self.window_size - noverlap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size == 0 || self.window_size == 0 {
            return Err(SpectroError::config("fft size and window size must be positive"));
        }
        if self.window_size > self.fft_size {
            return Err(SpectroError::config(format!(
                "window size {} exceeds fft size {}",
                self.window_size, self.fft_size
            )));
        }
        if !(0.0..100.0).contains(&self.overlap_pct) {
            return Err(SpectroError::config(format!(
                "overlap {}% is outside [0, 100)",
                self.overlap_pct
            )));
        }
        self.step()?;
        Ok(())
    }

    /// Number of complete frames that fit in `len` samples.
    pub fn frame_count(&self, len: usize) -> Result<usize> {
        let step = self.step()?;
        if len < self.window_size {
            return Ok(0);
        }
        Ok((len - self.window_size) / step + 1)
    }
}

/// Power spectral density over time.
///
/// Rows are frequency bins (ascending), columns are frames (ascending time).
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrogram {
    values: Vec<f32>,
    frequencies: Vec<f32>,
    times: Vec<f32>,
}

impl Spectrogram {
    pub fn from_parts(values: Vec<f32>, frequencies: Vec<f32>, times: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), frequencies.len() * times.len());
        Self {
            values,
            frequencies,
            times,
        }
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn n_freqs(&self) -> usize {
        self.frequencies.len()
    }

    pub fn n_frames(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at (`bin`, `frame`).
    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.values[bin * self.n_frames() + frame]
    }

    /// All frames of one frequency bin.
    pub fn row(&self, bin: usize) -> &[f32] {
        let width = self.n_frames();
        &self.values[bin * width..(bin + 1) * width]
    }

    /// Largest value, ignoring NaN. `None` for an empty matrix.
    pub fn max(&self) -> Option<f32> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> Spectrogram {
        Spectrogram {
            values: self.values.iter().map(|&v| f(v)).collect(),
            frequencies: self.frequencies.clone(),
            times: self.times.clone(),
        }
    }

    /// Shifts the time axis, e.g. from tile-relative to recording time.
    pub fn offset_times(mut self, seconds: f32) -> Spectrogram {
        for t in &mut self.times {
            *t += seconds;
        }
        self
    }

    /// Keeps only the bins whose frequency lies inside `band`.
    pub fn restrict(&self, band: &NumRange) -> Spectrogram {
        if band.is_unbounded() {
            return self.clone();
        }
        // The axis is ascending, so the kept bins form one contiguous block.
        let start = self
            .frequencies
            .partition_point(|&f| band.min().map_or(false, |lo| f < lo));
        let end = self
            .frequencies
            .partition_point(|&f| band.max().map_or(true, |hi| f <= hi))
            .max(start);

        let width = self.n_frames();
        Spectrogram {
            values: self.values[start * width..end * width].to_vec(),
            frequencies: self.frequencies[start..end].to_vec(),
            times: self.times.clone(),
        }
    }
}

/// Computes the one-sided power spectral density of `samples`.
pub fn compute(samples: &[f32], sample_rate: u32, params: &StftParams) -> Result<Spectrogram> {
    params.validate()?;
    if sample_rate == 0 {
        return Err(SpectroError::config("sample rate must be positive"));
    }

    let frame_count = params.frame_count(samples.len())?;
    if frame_count == 0 {
        return Err(SpectroError::InsufficientData(format!(
            "{} samples is shorter than one window of {} samples",
            samples.len(),
            params.window_size
        )));
    }
    let step = params.step()?;

    let window = params.window.coefficients(params.window_size);
    let window_power: f32 = window.iter().map(|w| w * w).sum();
    if window_power <= 0.0 {
        return Err(SpectroError::config(format!(
            "{} window of {} samples has no energy",
            params.window, params.window_size
        )));
    }
    let scale = 1.0 / (sample_rate as f32 * window_power);

    let fft_size = params.fft_size;
    let n_bins = fft_size / 2 + 1;
    let nyquist_bin = if fft_size % 2 == 0 { Some(fft_size / 2) } else { None };

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut values = vec![0.0f32; n_bins * frame_count];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];

    for frame in 0..frame_count {
        let start = frame * step;
        let chunk = &samples[start..start + params.window_size];

        buffer.fill(Complex::new(0.0, 0.0));
        for (slot, (&s, &w)) in buffer.iter_mut().zip(chunk.iter().zip(window.iter())) {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);

        for (bin, c) in buffer[..n_bins].iter().enumerate() {
            let mut power = c.norm_sqr() * scale;
            if bin != 0 && Some(bin) != nyquist_bin {
                power *= 2.0;
            }
            values[bin * frame_count + frame] = power;
        }
    }

    let bin_width = sample_rate as f32 / fft_size as f32;
    let frequencies = (0..n_bins).map(|j| j as f32 * bin_width).collect();
    let times = (0..frame_count)
        .map(|k| (params.window_size as f32 / 2.0 + (k * step) as f32) / sample_rate as f32)
        .collect();

    log::debug!(
        "STFT: {} samples -> {} frames x {} bins (step {})",
        samples.len(),
        frame_count,
        n_bins,
        step
    );

    Ok(Spectrogram::from_parts(values, frequencies, times))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(fft_size: usize, window_size: usize, overlap_pct: f32) -> StftParams {
        StftParams {
            fft_size,
            window_size,
            overlap_pct,
            window: WindowType::Hann,
        }
    }

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn one_second_at_1khz() {
        let samples = sine(100.0, 1000, 1000);
        let spec = compute(&samples, 1000, &params(100, 100, 0.0)).unwrap();
        assert_eq!(spec.n_frames(), 10);
        assert_eq!(spec.n_freqs(), 51);
        assert_eq!(spec.frequencies()[0], 0.0);
        assert!((spec.frequencies()[1] - 10.0).abs() < 1e-4);
        assert!((spec.frequencies()[50] - 500.0).abs() < 1e-3);
    }

    #[test]
    fn frame_count_with_overlap() {
        // noverlap = 90, step = 10 -> floor((1000 - 90) / 10) = 91
        let samples = vec![0.1f32; 1000];
        let spec = compute(&samples, 1000, &params(128, 100, 90.0)).unwrap();
        assert_eq!(spec.n_frames(), 91);
        assert_eq!(spec.times().len(), spec.n_frames());
    }

    #[test]
    fn frame_times_are_window_centers() {
        let samples = vec![0.0f32; 1000];
        let spec = compute(&samples, 1000, &params(100, 100, 50.0)).unwrap();
        // step = 50, t_k = (50 + 50k) / 1000
        assert!((spec.times()[0] - 0.05).abs() < 1e-6);
        assert!((spec.times()[1] - 0.10).abs() < 1e-6);
    }

    #[test]
    fn peak_lands_on_signal_frequency() {
        let samples = sine(100.0, 1000, 1000);
        let spec = compute(&samples, 1000, &params(100, 100, 0.0)).unwrap();
        let frame = 3;
        let peak_bin = (0..spec.n_freqs())
            .max_by(|&a, &b| spec.get(a, frame).partial_cmp(&spec.get(b, frame)).unwrap())
            .unwrap();
        assert_eq!(spec.frequencies()[peak_bin], 100.0);
    }

    #[test]
    fn psd_integrates_to_signal_power() {
        // Unit-amplitude sine has power 0.5; the density summed over bins times
        // the bin width recovers it.
        let samples = sine(125.0, 1000, 2000);
        let spec = compute(&samples, 1000, &params(200, 200, 0.0)).unwrap();
        let bin_width = 1000.0 / 200.0;
        let power: f32 = (0..spec.n_freqs()).map(|b| spec.get(b, 2)).sum::<f32>() * bin_width;
        assert!((power - 0.5).abs() < 0.05, "power = {}", power);
    }

    #[test]
    fn short_buffer_is_insufficient() {
        let err = compute(&[0.0; 50], 1000, &params(100, 100, 0.0)).unwrap_err();
        assert!(matches!(err, SpectroError::InsufficientData(_)));
    }

    #[test]
    fn window_larger_than_fft_is_rejected() {
        let err = compute(&[0.0; 500], 1000, &params(64, 128, 0.0)).unwrap_err();
        assert!(matches!(err, SpectroError::Config(_)));
    }

    #[test]
    fn overlap_without_hop_is_rejected() {
        // 99.5% of 100 floors to 99: still a hop of one sample
        assert_eq!(params(100, 100, 99.5).step().unwrap(), 1);
        let err = compute(&[0.0; 500], 1000, &params(100, 100, 100.0)).unwrap_err();
        assert!(matches!(err, SpectroError::Config(_)));
    }

    #[test]
    fn restrict_lower_bound_only() {
        let samples = sine(100.0, 1000, 1000);
        let spec = compute(&samples, 1000, &params(100, 100, 0.0)).unwrap();
        let band = NumRange::new(Some(100.0), None).unwrap();
        let restricted = spec.restrict(&band);
        assert_eq!(restricted.frequencies()[0], 100.0);
        assert_eq!(restricted.n_freqs(), 41);
        assert_eq!(restricted.n_frames(), spec.n_frames());
        assert_eq!(restricted.row(0), spec.row(10));
    }

    #[test]
    fn restrict_outside_axis_is_empty() {
        let spec = compute(&vec![0.5; 1000], 1000, &params(100, 100, 0.0)).unwrap();
        let band = NumRange::new(Some(600.0), Some(700.0)).unwrap();
        let restricted = spec.restrict(&band);
        assert!(restricted.is_empty());
        assert_eq!(restricted.max(), None);
    }

    proptest! {
        #[test]
        fn restrict_is_idempotent(lo in 0.0f32..500.0, width in 0.0f32..500.0) {
            let samples = sine(60.0, 1000, 600);
            let spec = compute(&samples, 1000, &params(64, 64, 25.0)).unwrap();
            let band = NumRange::new(Some(lo), Some(lo + width)).unwrap();
            let once = spec.restrict(&band);
            prop_assert_eq!(once.restrict(&band), once);
        }

        #[test]
        fn frame_count_law(len in 64usize..4000, window in 8usize..64, overlap in 0.0f32..95.0) {
            let p = params(64, window, overlap);
            let samples = vec![0.25f32; len];
            let spec = compute(&samples, 8000, &p).unwrap();
            let noverlap = p.noverlap();
            let step = window - noverlap;
            prop_assert_eq!(spec.n_frames(), (len - noverlap) / step);
            prop_assert_eq!(spec.times().len(), spec.n_frames());
        }
    }
}
