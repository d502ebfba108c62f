//! QR rasterization
//! Author: kartik4091
//! Created: 2026-03-04

use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::error::{Error, Result};

/// Error correction used for every sealed document (~15% damage tolerance)
pub const QR_EC_LEVEL: EcLevel = EcLevel::M;

/// Quiet zone, in modules, on each side of the symbol
pub const QUIET_ZONE: usize = 4;

pub const DARK: u8 = 0x00;
pub const LIGHT: u8 = 0xFF;

/// Square 8-bit grayscale raster, row-major, top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    pub size: u32,
    pub modules: usize,
    pub pixels: Vec<u8>,
}

impl QrImage {
    /// Gray value at (`x`, `y`), or `None` outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.pixels.get(y as usize * self.size as usize + x as usize).copied()
    }
}

/// Renders `data` as a QR code at level M, scaled to `size_px` square.
///
/// Modules are mapped with nearest-neighbour sampling, so when `size_px`
/// is not a multiple of the module count some modules are one pixel wider
/// than others.
pub fn render_qr(data: &[u8], size_px: u32) -> Result<QrImage> {
    let code = QrCode::with_error_correction_level(data, QR_EC_LEVEL)?;
    let width = code.width();
    let total = width + 2 * QUIET_ZONE;

    if (size_px as usize) < total {
        return Err(Error::Qr(format!(
            "{} px cannot hold {} modules",
            size_px, total
        )));
    }

    let colors = code.to_colors();
    let size = size_px as usize;
    let mut pixels = vec![LIGHT; size * size];

    for y in 0..size {
        let my = y * total / size;
        if my < QUIET_ZONE || my >= QUIET_ZONE + width {
            continue;
        }
        for x in 0..size {
            let mx = x * total / size;
            if mx < QUIET_ZONE || mx >= QUIET_ZONE + width {
                continue;
            }
            let idx = (my - QUIET_ZONE) * width + (mx - QUIET_ZONE);
            if colors[idx] == Color::Dark {
                pixels[y * size + x] = DARK;
            }
        }
    }

    debug!(
        version = ?code.version(),
        modules = width,
        bytes = data.len(),
        "Rendered QR code at {}px",
        size_px
    );

    Ok(QrImage { size: size_px, modules: width, pixels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let image = render_qr(b"docseal", 256).unwrap();
        assert_eq!(image.size, 256);
        assert_eq!(image.pixels.len(), 256 * 256);
        assert!(image.pixels.iter().all(|&p| p == DARK || p == LIGHT));
    }

    #[test]
    fn test_quiet_zone_and_finder_pattern() {
        let image = render_qr(b"docseal", 256).unwrap();
        let total = (image.modules + 2 * QUIET_ZONE) as u32;
        let module_px = 256 / total;

        // corners are quiet
        assert_eq!(image.pixel(0, 0), Some(LIGHT));
        assert_eq!(image.pixel(255, 255), Some(LIGHT));

        // top-left finder pattern starts right after the quiet zone
        let edge = QUIET_ZONE as u32 * 256 / total + module_px / 2 + 1;
        assert_eq!(image.pixel(edge, edge), Some(DARK));
    }

    #[test]
    fn test_pixel_outside_image() {
        let image = render_qr(b"docseal", 64).unwrap();
        assert_eq!(image.pixel(64, 0), None);
        assert_eq!(image.pixel(0, 64), None);
        assert_eq!(image.pixel(u32::MAX, u32::MAX), None);
        assert!(image.pixel(63, 63).is_some());
    }

    #[test]
    fn test_payload_sized_input_fits() {
        let data = vec![0x5Au8; 315];
        let image = render_qr(&data, 256).unwrap();
        assert!(image.modules <= 97);
    }

    #[test]
    fn test_too_small_canvas() {
        assert!(matches!(render_qr(&[1u8; 300], 40), Err(Error::Qr(_))));
    }

    #[test]
    fn test_oversized_data_rejected() {
        assert!(render_qr(&vec![0u8; 5000], 256).is_err());
    }
}
