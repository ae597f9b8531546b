//! Template Images
//!
//! A template is decoded once and then copied for every render. PDF
//! templates are rasterized from their first page with poppler's
//! `pdftoppm`.

use image::RgbaImage;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use thiserror::Error;

pub const DEFAULT_PDF_DPI: u32 = 200;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Template read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF rasterization failed: {0}")]
    Rasterize(String),
}

/// Decoded template, never drawn on directly.
#[derive(Debug, Clone)]
pub struct TemplateImage {
    image: RgbaImage,
}

impl TemplateImage {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decode any raster format the `image` crate understands.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self { image: decoded.to_rgba8() })
    }

    /// Open a template file; `.pdf` files are rasterized at `dpi`.
    pub fn open(path: &Path, dpi: u32) -> Result<Self, TemplateError> {
        let is_pdf = path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            return Self::rasterize_pdf(path, dpi);
        }
        let bytes = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "decoding template");
        Self::from_bytes(&bytes)
    }

    fn rasterize_pdf(path: &Path, dpi: u32) -> Result<Self, TemplateError> {
        let temp_dir = TempDir::new()?;
        let prefix = temp_dir.path().join("page");

        tracing::info!(path = %path.display(), dpi, "rasterizing first PDF page");
        let output = Command::new("pdftoppm")
            .arg("-png")
            .args(["-r", &dpi.to_string()])
            .args(["-f", "1", "-l", "1"])
            .arg("-singlefile")
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| TemplateError::Rasterize(format!("cannot run pdftoppm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TemplateError::Rasterize(stderr.trim().to_string()));
        }

        let rendered = temp_dir.path().join("page.png");
        if !rendered.exists() {
            return Err(TemplateError::Rasterize(format!(
                "pdftoppm produced no output at {}",
                rendered.display()
            )));
        }
        let bytes = std::fs::read(&rendered)?;
        Self::from_bytes(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// An independent copy to draw one certificate on.
    pub fn fresh_copy(&self) -> RgbaImage {
        self.image.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([250, 240, 230, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_from_bytes_png() {
        let template = TemplateImage::from_bytes(&png_bytes(30, 20)).unwrap();
        assert_eq!((template.width(), template.height()), (30, 20));
        assert_eq!(template.image().get_pixel(0, 0).0, [250, 240, 230, 255]);
    }

    #[test]
    fn test_corrupt_bytes_is_decode_error() {
        let err = TemplateImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, TemplateError::Decode(_)));
        assert!(err.to_string().contains("Template decode failed"));
    }

    #[test]
    fn test_open_raster_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("template.png");
        std::fs::write(&path, png_bytes(12, 9)).unwrap();
        let template = TemplateImage::open(&path, DEFAULT_PDF_DPI).unwrap();
        assert_eq!(template.width(), 12);
    }

    #[test]
    fn test_open_missing_file() {
        let err = TemplateImage::open(Path::new("/nonexistent/template.png"), 200).unwrap_err();
        assert!(matches!(err, TemplateError::Io(_)));
    }

    #[test]
    fn test_fresh_copy_is_independent() {
        let template = TemplateImage::from_bytes(&png_bytes(4, 4)).unwrap();
        let mut copy = template.fresh_copy();
        copy.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(template.image().get_pixel(0, 0).0, [250, 240, 230, 255]);
    }
}
