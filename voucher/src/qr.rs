//! QR rendering of voucher secrets

use std::io::Cursor;

use image::{imageops, ImageBuffer, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::crypto::VoucherSecret;
use crate::error::{Result, VoucherError};

/// Side length of every rendered QR image, in pixels
pub const QR_PIXEL_WIDTH: u32 = 512;

/// Render a secret as a square PNG at error-correction level High
///
/// Modules are whole pixels; the code is centered on a white canvas of
/// exactly `QR_PIXEL_WIDTH` pixels.
pub fn render_secret_png(secret: &VoucherSecret) -> Result<Vec<u8>> {
    render_png(secret.as_str().as_bytes(), QR_PIXEL_WIDTH)
}

pub fn render_png(data: &[u8], width: u32) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data, EcLevel::H)
        .map_err(|e| VoucherError::QrEncoding(e.to_string()))?;

    let symbol = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .max_dimensions(width, width)
        .build();

    if symbol.width() > width || symbol.height() > width {
        return Err(VoucherError::QrEncoding(format!(
            "{} pixels is too small for a {}-module symbol",
            width,
            code.width()
        )));
    }

    let mut canvas = ImageBuffer::from_pixel(width, width, Luma([255u8]));
    let x = i64::from((width - symbol.width()) / 2);
    let y = i64::from((width - symbol.height()) / 2);
    imageops::overlay(&mut canvas, &symbol, x, y);

    let mut bytes = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| VoucherError::QrEncoding(e.to_string()))?;
    Ok(bytes)
}
