use std::path::Path;

use crate::Result;
use crate::cache::write_atomic;

/// Pack one pixel as 5 bits red, 6 bits green, 5 bits blue
#[inline]
pub fn pack_pixel(red: u8, green: u8, blue: u8) -> u16 {
    (((red & 0xF8) as u16) << 8) | (((green & 0xFC) as u16) << 3) | ((blue >> 3) as u16)
}

/// Decode an image and dump its pixels as big-endian RGB565, row-major
pub fn rgb565_from_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let mut packed = Vec::with_capacity(rgb.as_raw().len() / 3 * 2);
    for pixel in rgb.pixels() {
        let [red, green, blue] = pixel.0;
        packed.extend_from_slice(&pack_pixel(red, green, blue).to_be_bytes());
    }
    Ok(packed)
}

/// Write the packed artifact for a raw tile
///
/// Returns `false` without touching anything when the target exists and
/// `overwrite` is not set.
pub fn write_rgb565(raw_path: &Path, packed_path: &Path, overwrite: bool) -> Result<bool> {
    if !overwrite && packed_path.exists() {
        return Ok(false);
    }

    let packed = rgb565_from_image(&std::fs::read(raw_path)?)?;
    if let Some(parent) = packed_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(packed_path, &packed)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn solid_png(color: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb(color));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_pack_pixel_primaries() {
        assert_eq!(pack_pixel(255, 0, 0), 0xF800);
        assert_eq!(pack_pixel(0, 255, 0), 0x07E0);
        assert_eq!(pack_pixel(0, 0, 255), 0x001F);
        assert_eq!(pack_pixel(255, 255, 255), 0xFFFF);
        assert_eq!(pack_pixel(0, 0, 0), 0x0000);
        // Low bits are discarded
        assert_eq!(pack_pixel(7, 3, 7), 0x0000);
    }

    #[test]
    fn test_solid_red_is_big_endian_f800() {
        let packed = rgb565_from_image(&solid_png([255, 0, 0])).unwrap();
        assert_eq!(packed.len(), 4 * 2 * 2);
        for pair in packed.chunks_exact(2) {
            assert_eq!(pair, &[0xF8, 0x00]);
        }
    }

    #[test]
    fn test_solid_white_is_ffff() {
        let packed = rgb565_from_image(&solid_png([255, 255, 255])).unwrap();
        assert!(packed.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_row_major_order() {
        let img = image::RgbImage::from_fn(2, 2, |x, y| match (x, y) {
            (0, 0) => image::Rgb([255, 0, 0]),
            (1, 0) => image::Rgb([0, 255, 0]),
            (0, 1) => image::Rgb([0, 0, 255]),
            _ => image::Rgb([255, 255, 255]),
        });
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();

        let packed = rgb565_from_image(buffer.get_ref()).unwrap();
        assert_eq!(packed, vec![0xF8, 0x00, 0x07, 0xE0, 0x00, 0x1F, 0xFF, 0xFF]);
    }

    #[test]
    fn test_write_rgb565_skips_existing() {
        let temp = tempfile::TempDir::new().unwrap();
        let raw = temp.path().join("0.png");
        let packed = temp.path().join("rgb565/0/0/0.bin");
        std::fs::write(&raw, solid_png([255, 0, 0])).unwrap();

        assert!(write_rgb565(&raw, &packed, false).unwrap());
        std::fs::write(&packed, b"sentinel").unwrap();

        assert!(!write_rgb565(&raw, &packed, false).unwrap());
        assert_eq!(std::fs::read(&packed).unwrap(), b"sentinel");

        assert!(write_rgb565(&raw, &packed, true).unwrap());
        assert_eq!(std::fs::read(&packed).unwrap().len(), 16);
    }
}
