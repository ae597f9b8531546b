//! Font Resolution - preferred, default, built-in
//!
//! Resolution never fails. Each step down the chain is logged and the
//! renderer keeps going with whatever font is left.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::wrap::TextMeasure;

pub const DEFAULT_PREFERRED_FONT: &str = "arial.ttf";

/// Fonts tried, in order, when the preferred font is unavailable.
pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "FreeSans.ttf",
];

/// Cell size of the built-in bitmap font. Requested sizes are ignored.
pub const BUILTIN_GLYPH_SIZE: u32 = 8;

const MAX_SEARCH_DEPTH: usize = 4;

/// Which link of the chain produced the font actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSource {
    /// The font the caller asked for
    Preferred,
    /// Bundled/system default at the requested size
    Default,
    /// Fixed-size bitmap font compiled into the engine
    Builtin,
}

struct LoadedFont {
    font: Font<'static>,
    origin: PathBuf,
}

/// Immutable set of fonts a renderer may draw with.
pub struct FontChain {
    preferred: Option<LoadedFont>,
    fallback: Option<LoadedFont>,
}

impl FontChain {
    /// Resolve `preferred` (a path, or a file name searched in the system
    /// font directories) and the default candidates.
    pub fn resolve(preferred: &str) -> Self {
        let preferred_font = locate(preferred).and_then(|p| load(&p));
        if preferred_font.is_none() {
            tracing::warn!(font = preferred, "preferred font unavailable, trying defaults");
        }

        let fallback = DEFAULT_FONT_CANDIDATES
            .iter()
            .filter_map(|name| locate(name))
            .find_map(|p| load(&p));
        if preferred_font.is_none() && fallback.is_none() {
            tracing::warn!("no outline font available, using built-in bitmap font");
        }

        Self { preferred: preferred_font, fallback }
    }

    /// A chain with no outline fonts; always renders with the bitmap font.
    pub fn builtin_only() -> Self {
        Self { preferred: None, fallback: None }
    }

    /// Build from in-memory font files. Unparseable data counts as missing.
    pub fn from_font_data(preferred: Option<Vec<u8>>, fallback: Option<Vec<u8>>) -> Self {
        let parse = |data: Vec<u8>| {
            Font::try_from_vec(data).map(|font| LoadedFont {
                font,
                origin: PathBuf::from("<memory>"),
            })
        };
        Self {
            preferred: preferred.and_then(parse),
            fallback: fallback.and_then(parse),
        }
    }

    /// Pick the first available font for `font_size`.
    pub fn at_size(&self, font_size: u32) -> SizedFont<'_> {
        let px = font_size.max(1) as f32;
        if let Some(loaded) = &self.preferred {
            return SizedFont::outline(&loaded.font, px, FontSource::Preferred);
        }
        if let Some(loaded) = &self.fallback {
            return SizedFont::outline(&loaded.font, px, FontSource::Default);
        }
        SizedFont::Bitmap
    }

    /// The source `at_size` will use.
    pub fn source(&self) -> FontSource {
        match (&self.preferred, &self.fallback) {
            (Some(_), _) => FontSource::Preferred,
            (None, Some(_)) => FontSource::Default,
            (None, None) => FontSource::Builtin,
        }
    }

    pub fn describe(&self) -> String {
        match (&self.preferred, &self.fallback) {
            (Some(f), _) | (None, Some(f)) => f.origin.display().to_string(),
            (None, None) => "builtin 8x8".to_string(),
        }
    }
}

impl Default for FontChain {
    fn default() -> Self {
        Self::resolve(DEFAULT_PREFERRED_FONT)
    }
}

/// A font bound to one pixel size, ready to measure and draw.
pub enum SizedFont<'a> {
    Outline {
        font: &'a Font<'static>,
        scale: Scale,
        source: FontSource,
    },
    Bitmap,
}

impl<'a> SizedFont<'a> {
    fn outline(font: &'a Font<'static>, px: f32, source: FontSource) -> Self {
        Self::Outline {
            font,
            scale: em_scale(font, px),
            source,
        }
    }

    pub fn source(&self) -> FontSource {
        match self {
            Self::Outline { source, .. } => *source,
            Self::Bitmap => FontSource::Builtin,
        }
    }

    /// Draw `text` with its top-left (ascender line) at `(x, y)`.
    pub fn draw_text(&self, img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>) {
        match self {
            Self::Outline { font, scale, .. } => {
                let ascent = font.v_metrics(*scale).ascent;
                let origin = point(x as f32, y as f32 + ascent);
                for glyph in font.layout(text, *scale, origin) {
                    let Some(bb) = glyph.pixel_bounding_box() else {
                        continue;
                    };
                    glyph.draw(|gx, gy, coverage| {
                        blend(img, bb.min.x + gx as i32, bb.min.y + gy as i32, color, coverage);
                    });
                }
            }
            Self::Bitmap => {
                let mut caret = x;
                for ch in text.chars() {
                    if let Some(rows) = BASIC_FONTS.get(ch).or_else(|| LATIN_FONTS.get(ch)) {
                        for (row, bits) in rows.iter().enumerate() {
                            for col in 0..BUILTIN_GLYPH_SIZE {
                                if bits & (1 << col) != 0 {
                                    blend(img, caret + col as i32, y + row as i32, color, 1.0);
                                }
                            }
                        }
                    }
                    caret += BUILTIN_GLYPH_SIZE as i32;
                }
            }
        }
    }
}

impl TextMeasure for SizedFont<'_> {
    fn text_width(&self, text: &str) -> u32 {
        match self {
            Self::Outline { font, scale, .. } => {
                let right = font
                    .layout(text, *scale, point(0.0, 0.0))
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .fold(0.0_f32, f32::max);
                right.ceil() as u32
            }
            Self::Bitmap => text.chars().count() as u32 * BUILTIN_GLYPH_SIZE,
        }
    }
}

/// Scale so that one em equals `px` pixels, matching point-size semantics.
fn em_scale(font: &Font<'static>, px: f32) -> Scale {
    let units = f32::from(font.units_per_em());
    let vm = font.v_metrics_unscaled();
    let height = vm.ascent - vm.descent;
    if units <= 0.0 || height <= 0.0 {
        return Scale::uniform(px);
    }
    Scale::uniform(px * height / units)
}

fn blend(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= img.width() || y >= img.height() {
        return;
    }
    let a = coverage.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst = img.get_pixel_mut(x, y);
    let inv = 1.0 - a;
    for c in 0..3 {
        dst.0[c] = (color.0[c] as f32 * a + dst.0[c] as f32 * inv).round() as u8;
    }
    dst.0[3] = dst.0[3].max((a * 255.0).round() as u8);
}

fn load(path: &Path) -> Option<LoadedFont> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "font unreadable");
            return None;
        }
    };
    match Font::try_from_vec(data) {
        Some(font) => {
            tracing::debug!(path = %path.display(), "font loaded");
            Some(LoadedFont { font, origin: path.to_path_buf() })
        }
        None => {
            tracing::debug!(path = %path.display(), "font data not parseable");
            None
        }
    }
}

/// Find a font by explicit path, or by file name in the font directories.
fn locate(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    let wanted = direct.file_name()?.to_string_lossy().to_lowercase();
    font_dirs()
        .iter()
        .find_map(|dir| search_dir(dir, &wanted, MAX_SEARCH_DEPTH))
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("fonts"),
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    if let Ok(windir) = std::env::var("WINDIR") {
        dirs.push(PathBuf::from(windir).join("Fonts"));
    }
    dirs
}

fn search_dir(dir: &Path, wanted: &str, depth: usize) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = vec![];
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path
            .file_name()
            .map_or(false, |n| n.to_string_lossy().to_lowercase() == wanted)
        {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| search_dir(sub, wanted, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_only_chain() {
        let chain = FontChain::builtin_only();
        assert_eq!(chain.source(), FontSource::Builtin);
        assert_eq!(chain.at_size(60).source(), FontSource::Builtin);
        assert_eq!(chain.describe(), "builtin 8x8");
    }

    #[test]
    fn test_builtin_ignores_requested_size() {
        let chain = FontChain::builtin_only();
        let small = chain.at_size(10).text_width("Hello");
        let large = chain.at_size(100).text_width("Hello");
        assert_eq!(small, 40);
        assert_eq!(small, large);
    }

    #[test]
    fn test_garbage_font_data_falls_through() {
        let chain = FontChain::from_font_data(Some(b"not a font".to_vec()), Some(vec![]));
        assert_eq!(chain.source(), FontSource::Builtin);
    }

    #[test]
    fn test_missing_preferred_font_never_fails() {
        let chain = FontChain::resolve("/nonexistent/definitely-missing-font.ttf");
        assert_ne!(chain.source(), FontSource::Preferred);
    }

    #[test]
    fn test_bitmap_draws_black_pixels() {
        let mut img = RgbaImage::from_pixel(16, 8, Rgba([255, 255, 255, 255]));
        SizedFont::Bitmap.draw_text(&mut img, 0, 0, "H", Rgba([0, 0, 0, 255]));
        let dark = img.pixels().filter(|p| p.0[0] == 0).count();
        assert!(dark > 0);
        // second cell untouched
        for y in 0..8 {
            for x in 8..16 {
                assert_eq!(img.get_pixel(x, y).0, [255, 255, 255, 255]);
            }
        }
    }

    #[test]
    fn test_draw_clips_outside_image() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        SizedFont::Bitmap.draw_text(&mut img, -20, -20, "WWW", Rgba([0, 0, 0, 255]));
        SizedFont::Bitmap.draw_text(&mut img, 100, 100, "WWW", Rgba([0, 0, 0, 255]));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    /// Bytes of the first default candidate installed on this machine.
    fn system_font_data() -> Option<Vec<u8>> {
        DEFAULT_FONT_CANDIDATES
            .iter()
            .filter_map(|name| locate(name))
            .filter_map(|path| fs::read(path).ok())
            .find(|data| Font::try_from_bytes(data).is_some())
    }

    #[test]
    fn test_fallback_font_used_when_preferred_unparseable() {
        let Some(data) = system_font_data() else {
            eprintln!("no outline font installed, skipping");
            return;
        };
        let chain = FontChain::from_font_data(Some(b"not a font".to_vec()), Some(data));
        assert_eq!(chain.source(), FontSource::Default);
        assert_eq!(chain.at_size(40).source(), FontSource::Default);
    }

    #[test]
    fn test_outline_width_follows_requested_size() {
        let Some(data) = system_font_data() else {
            eprintln!("no outline font installed, skipping");
            return;
        };
        let chain = FontChain::from_font_data(None, Some(data));
        let small = chain.at_size(20).text_width("Certificate");
        let medium = chain.at_size(40).text_width("Certificate");
        let large = chain.at_size(80).text_width("Certificate");
        assert!(small > 0);
        assert!(small < medium && medium < large, "{} {} {}", small, medium, large);
        // advance widths scale linearly, up to rounding
        assert!(large.abs_diff(medium * 2) <= 2, "{} vs {}", large, medium);
        assert!(chain.at_size(40).text_width("ab cd") > chain.at_size(40).text_width("abcd"));
    }

    #[test]
    fn test_outline_ink_stays_within_line() {
        let Some(data) = system_font_data() else {
            eprintln!("no outline font installed, skipping");
            return;
        };
        let chain = FontChain::from_font_data(None, Some(data));
        let (x, y, size) = (10, 30, 40);
        let font = chain.at_size(size);
        let mut img = RgbaImage::from_pixel(400, 160, Rgba([255, 255, 255, 255]));
        font.draw_text(&mut img, x, y, "Hgjy", Rgba([0, 0, 0, 255]));

        let inked: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [255, 255, 255, 255])
            .map(|(px, py, _)| (px, py))
            .collect();
        assert!(!inked.is_empty());

        let bottom = y as u32 + crate::wrap::line_pitch(size);
        for &(_, py) in &inked {
            assert!((y as u32..bottom).contains(&py), "row {} outside [{}, {})", py, y, bottom);
        }
    }

    #[test]
    fn test_search_dir_finds_nested_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("truetype").join("dejavu");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("DejaVuSans.ttf"), b"x").unwrap();
        let found = search_dir(dir.path(), "dejavusans.ttf", MAX_SEARCH_DEPTH);
        assert_eq!(found, Some(nested.join("DejaVuSans.ttf")));
        assert_eq!(search_dir(dir.path(), "dejavusans.ttf", 0), None);
    }
}
