//! Certificate Renderer
//!
//! `render(template, field_map, record, font_size)` draws every field of the
//! map, in map order, onto a fresh copy of the template. Nothing else feeds
//! into the output.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

use crate::font::{FontChain, FontSource, SizedFont};
use crate::layout::FieldMap;
use crate::records::Record;
use crate::template::{TemplateError, TemplateImage};
use crate::wrap::layout_text;

pub const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Draws records onto templates with a fixed font chain.
pub struct CertificateRenderer {
    fonts: FontChain,
}

impl CertificateRenderer {
    pub fn new(fonts: FontChain) -> Self {
        Self { fonts }
    }

    pub fn font_source(&self) -> FontSource {
        self.fonts.source()
    }

    pub fn fonts(&self) -> &FontChain {
        &self.fonts
    }

    /// Render one certificate. The template is copied, never modified.
    pub fn render(
        &self,
        template: &TemplateImage,
        field_map: &FieldMap,
        record: &Record,
        font_size: u32,
    ) -> RgbaImage {
        let font = self.fonts.at_size(font_size);
        let mut canvas = template.fresh_copy();
        for slot in field_map.iter() {
            draw_field(&mut canvas, &font, slot.bounds, record.get(&slot.name), font_size);
        }
        canvas
    }

    /// Decode `template_bytes`, render, and encode to PNG.
    pub fn render_bytes(
        &self,
        template_bytes: &[u8],
        field_map: &FieldMap,
        record: &Record,
        font_size: u32,
    ) -> Result<Vec<u8>, RenderError> {
        let template = TemplateImage::from_bytes(template_bytes)?;
        let image = self.render(&template, field_map, record, font_size);
        encode_png(&image)
    }
}

impl Default for CertificateRenderer {
    fn default() -> Self {
        Self::new(FontChain::default())
    }
}

fn draw_field(
    canvas: &mut RgbaImage,
    font: &SizedFont<'_>,
    bounds: crate::layout::LayoutBox,
    text: &str,
    font_size: u32,
) {
    if text.trim().is_empty() {
        return;
    }
    for line in layout_text(text, &bounds, font_size, font) {
        tracing::trace!(text = %line.text, x = line.x, y = line.y, width = line.width, "line");
        font.draw_text(canvas, line.x, line.y, &line.text, TEXT_COLOR);
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
