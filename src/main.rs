mod analysis;
mod audio;
mod cli;
mod config;
mod error;
mod pipeline;
mod render;
mod tiling;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use cli::Cli;
use config::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Config file values sit under explicit CLI flags
    let file_config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {:#}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    let config = cli.overlay(file_config.analysis_config()?)?;

    let input = &cli.audio_file;
    audio::decode::check_extension(input)?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let output = cli.output_path();

    log::info!("spectile - spectrogram tile generator");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output.display());
    log::info!(
        "STFT: nfft={}, window={} ({}), overlap={}%",
        config.stft.fft_size,
        config.stft.window_size,
        config.stft.window,
        config.stft.overlap_pct
    );
    log::info!(
        "Plot range: {}, reference range: {}, colormap: {}",
        config.freq_range,
        config.reference_band(),
        config.render.colormap
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_wav(input)?;

    // 2. Tiles
    let tile_count = (1usize << config.tile_levels) - 1;
    let pb = if tile_count > 1 {
        let pb = ProgressBar::new(tile_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles ({eta} remaining)")?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let summary = pipeline::run(&audio_data, &config, &output, pb.as_ref())?;

    if let Some(pb) = pb {
        pb.finish_with_message("Rendering complete");
    }

    if let Some(reference) = summary.reference {
        log::info!("Reference maximum used: {:.3e}", reference.reference_max());
    }
    for path in &summary.written {
        log::debug!("Wrote {}", path.display());
    }
    log::info!("Done! {} image(s) written", summary.written.len());
    Ok(())
}
