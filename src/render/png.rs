use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use std::io;
use std::path::{Path, PathBuf};

use super::colormap::{ColorScale, Colormap};
use crate::analysis::range::NumRange;
use crate::analysis::stft::Spectrogram;
use crate::error::{Result, SpectroError};

/// How normalized spectrograms become pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub colormap: Colormap,
    /// Absolute dB clipping; open bounds follow each tile's data.
    pub color_range: NumRange,
    /// Output size in pixels; `None` keeps one pixel per bin and frame.
    pub size: Option<(u32, u32)>,
}

/// Paints a dB spectrogram: time runs left to right, the lowest frequency sits
/// on the bottom row.
pub fn paint(db: &Spectrogram, settings: &RenderSettings) -> Result<RgbImage> {
    if db.is_empty() {
        return Err(SpectroError::config(
            "plot frequency range selects no frequency bins",
        ));
    }
    let width = db.n_frames() as u32;
    let height = db.n_freqs() as u32;
    let scale = ColorScale::resolve(&settings.color_range, db.values());

    let mut img = RgbImage::new(width, height);
    for bin in 0..db.n_freqs() {
        let y = height - 1 - bin as u32;
        for (frame, &value) in db.row(bin).iter().enumerate() {
            let color = settings.colormap.color(scale.position(value));
            img.put_pixel(frame as u32, y, Rgb(color));
        }
    }

    Ok(match settings.size {
        Some((w, h)) if (w, h) != (width, height) => imageops::resize(&img, w, h, FilterType::Nearest),
        _ => img,
    })
}

/// Writes `img` as PNG. The data lands in a sibling temporary file first, so
/// `path` only ever holds a complete image.
pub fn write_png(img: &RgbImage, path: &Path) -> Result<()> {
    let tmp = temp_sibling(path);
    if let Err(err) = img.save_with_format(&tmp, ImageFormat::Png) {
        let _ = std::fs::remove_file(&tmp);
        return Err(match err {
            image::ImageError::IoError(e) => SpectroError::Io(e),
            other => SpectroError::Io(io::Error::other(other)),
        });
    }
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    log::debug!("Wrote {} ({}x{})", path.display(), img.width(), img.height());
    Ok(())
}

pub fn render_to_file(db: &Spectrogram, settings: &RenderSettings, path: &Path) -> Result<()> {
    let img = paint(db, settings)?;
    write_png(&img, path)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(size: Option<(u32, u32)>) -> RenderSettings {
        RenderSettings {
            colormap: Colormap::Gray,
            color_range: NumRange::UNBOUNDED,
            size,
        }
    }

    fn ramp() -> Spectrogram {
        // 2 bins x 3 frames; bin 1 is loud
        Spectrogram::from_parts(
            vec![-60.0, -60.0, -60.0, 0.0, 0.0, 0.0],
            vec![0.0, 100.0],
            vec![0.1, 0.2, 0.3],
        )
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spectile-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn low_frequencies_are_at_the_bottom() {
        let img = paint(&ramp(), &settings(None)).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        // Gray: loud is white, quiet is black
        assert_eq!(img.get_pixel(0, 0).0, Colormap::Gray.color(1.0));
        assert_eq!(img.get_pixel(0, 1).0, Colormap::Gray.color(0.0));
    }

    #[test]
    fn resizes_to_requested_size() {
        let img = paint(&ramp(), &settings(Some((30, 20)))).unwrap();
        assert_eq!(img.dimensions(), (30, 20));
        assert_eq!(img.get_pixel(29, 0).0, Colormap::Gray.color(1.0));
        assert_eq!(img.get_pixel(0, 19).0, Colormap::Gray.color(0.0));
    }

    #[test]
    fn empty_spectrogram_is_a_config_error() {
        let empty = Spectrogram::from_parts(vec![], vec![], vec![0.1]);
        assert!(matches!(paint(&empty, &settings(None)), Err(SpectroError::Config(_))));
    }

    #[test]
    fn writes_png_without_leftovers() {
        let dir = scratch_dir("write");
        let path = dir.join("tile_1_0.png");
        render_to_file(&ramp(), &settings(None), &path).unwrap();

        let read = image::open(&path).unwrap().to_rgb8();
        assert_eq!(read.dimensions(), (3, 2));
        assert!(!temp_sibling(&path).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let path = Path::new("/nonexistent-dir/spectile/out.png");
        let img = paint(&ramp(), &settings(None)).unwrap();
        assert!(matches!(write_png(&img, path), Err(SpectroError::Io(_))));
    }
}
