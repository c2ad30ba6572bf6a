//! Tile format conversion: palette reduction and RGB565 packing.
//!
//! Everything here is blocking CPU and file work; async callers run it on the
//! blocking pool.

mod rgb565;

pub use rgb565::*;

use color_quant::NeuQuant;
use image::RgbaImage;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::Result;
use crate::cache::write_atomic;

/// Palette size of reduced-color tiles
pub const PALETTE_COLORS: usize = 256;

/// NeuQuant sampling factor; 1 is slowest/best, 30 fastest
const QUANT_SAMPLE_FACTOR: i32 = 10;

/// Which conversions to apply to every resolved tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionPolicy {
    /// Rewrite the raw tile as a 256-color indexed PNG
    pub reduce_colors: bool,
    /// Produce the packed RGB565 artifact
    pub pack_rgb565: bool,
}

impl ConversionPolicy {
    /// Packing implies palette reduction first
    pub fn new(reduce_colors: bool, pack_rgb565: bool) -> Self {
        Self {
            reduce_colors: reduce_colors || pack_rgb565,
            pack_rgb565,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        !self.reduce_colors && !self.pack_rgb565
    }

    /// Apply the policy to a cached tile; returns whether anything was written
    ///
    /// `refresh_packed` rebuilds the packed artifact even if one exists, which
    /// is what a freshly downloaded raw tile needs.
    pub fn apply(&self, raw_path: &Path, packed_path: &Path, refresh_packed: bool) -> Result<bool> {
        let mut converted = false;
        if self.reduce_colors {
            converted |= reduce_colors_in_place(raw_path)?;
        }
        if self.pack_rgb565 {
            converted |= write_rgb565(raw_path, packed_path, refresh_packed)?;
        }
        Ok(converted)
    }
}

/// Whether the encoded image already uses a palette
pub fn is_indexed(bytes: &[u8]) -> Result<bool> {
    if image::guess_format(bytes)? != image::ImageFormat::Png {
        return Ok(false);
    }
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info()?;
    Ok(reader.info().color_type == png::ColorType::Indexed)
}

/// Quantize an encoded image to a 256-color indexed PNG
///
/// Images that already use at most 256 distinct colors keep them exactly;
/// anything richer goes through NeuQuant.
pub fn quantize_to_indexed_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let (palette_rgba, indices) = match exact_palette(&rgba) {
        Some(exact) => exact,
        None => neuquant_palette(&rgba),
    };

    let palette: Vec<u8> = palette_rgba
        .iter()
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect();
    let alpha: Vec<u8> = palette_rgba.iter().map(|c| c[3]).collect();

    let mut encoded = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut encoded, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette);
        if alpha.iter().any(|&a| a != u8::MAX) {
            encoder.set_trns(alpha);
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&indices)?;
        writer.finish()?;
    }

    Ok(encoded)
}

fn exact_palette(rgba: &RgbaImage) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut palette: Vec<[u8; 4]> = Vec::new();
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut indices = Vec::with_capacity((rgba.width() * rgba.height()) as usize);

    for pixel in rgba.pixels() {
        let index = match lookup.get(&pixel.0) {
            Some(&index) => index,
            None => {
                if palette.len() == PALETTE_COLORS {
                    return None;
                }
                let index = palette.len() as u8;
                palette.push(pixel.0);
                lookup.insert(pixel.0, index);
                index
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

fn neuquant_palette(rgba: &RgbaImage) -> (Vec<[u8; 4]>, Vec<u8>) {
    // Keep at least ~100 learning samples on small images
    let pixel_count = (rgba.width() * rgba.height()) as i32;
    let sample_factor = (pixel_count / 100).clamp(1, QUANT_SAMPLE_FACTOR);

    let quantizer = NeuQuant::new(sample_factor, PALETTE_COLORS, rgba.as_raw());
    let indices = rgba
        .pixels()
        .map(|pixel| quantizer.index_of(&pixel.0) as u8)
        .collect();
    let palette = quantizer
        .color_map_rgba()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();

    (palette, indices)
}

/// Rewrite a cached tile as an indexed PNG; `false` if it already was one
pub fn reduce_colors_in_place(path: &Path) -> Result<bool> {
    let bytes = std::fs::read(path)?;
    if is_indexed(&bytes)? {
        return Ok(false);
    }

    let indexed = quantize_to_indexed_png(&bytes)?;
    write_atomic(path, &indexed)?;
    tracing::debug!("Reduced {} to {} colors", path.display(), PALETTE_COLORS);
    Ok(true)
}
