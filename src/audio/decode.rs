use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::SpectroError;

/// Mono samples of a whole recording.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Only `.wav` recordings are accepted.
pub fn check_extension(path: &Path) -> Result<(), SpectroError> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        Ok(())
    } else {
        Err(SpectroError::config(format!(
            "input audio file should have a .wav extension: {}",
            path.display()
        )))
    }
}

pub fn decode_wav(path: &Path) -> Result<SampleBuffer> {
    check_extension(path)?;

    let file = std::fs::File::open(path)
        .map_err(SpectroError::from)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_error)
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| invalid_data("no audio tracks found"))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| invalid_data("unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(decode_error(e).into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(err)) => {
                log::warn!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(decode_error(e).into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = DecodeBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    let buffer = SampleBuffer {
        samples: all_samples,
        sample_rate,
    };

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s ({} channel{})",
        buffer.samples.len(),
        sample_rate,
        buffer.duration(),
        channels,
        if channels == 1 { "" } else { "s" }
    );

    Ok(buffer)
}

fn decode_error(err: SymphoniaError) -> SpectroError {
    match err {
        SymphoniaError::IoError(e) => SpectroError::Io(e),
        other => SpectroError::Io(io::Error::other(other)),
    }
}

fn invalid_data(msg: &str) -> SpectroError {
    SpectroError::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_extension_is_case_insensitive() {
        assert!(check_extension(Path::new("dive_03.WAV")).is_ok());
        assert!(check_extension(Path::new("/data/dive_03.wav")).is_ok());
    }

    #[test]
    fn other_extensions_are_rejected() {
        assert!(matches!(
            check_extension(Path::new("dive_03.mp3")),
            Err(SpectroError::Config(_))
        ));
        assert!(check_extension(Path::new("dive_03")).is_err());
    }

    #[test]
    fn duration_from_sample_count() {
        let buffer = SampleBuffer {
            samples: vec![0.0; 22050],
            sample_rate: 44100,
        };
        assert!((buffer.duration() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn garbage_wav_is_an_io_error() {
        let dir = std::env::temp_dir().join(format!("spectile-decode-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.wav");
        std::fs::write(&path, b"this is not a riff file, just some bytes").unwrap();

        let err = decode_wav(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<SpectroError>(), Some(SpectroError::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = decode_wav(Path::new("/nonexistent/recording.wav")).unwrap_err();
        assert!(matches!(err.downcast_ref::<SpectroError>(), Some(SpectroError::Io(_))));
    }
}
