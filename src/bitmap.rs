use std::io::Cursor;

use image::{ImageError, ImageFormat, RgbaImage};

use crate::error::{PixelPerfectError, Result};

/// Decoded RGBA8 image, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wraps a raw buffer, rejecting one whose length is not `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(PixelPerfectError::usage(format!(
                "bitmap buffer holds {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Decodes PNG bytes into RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            width,
            height,
            data: img.into_raw(),
        })
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let img = RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            PixelPerfectError::Image(ImageError::Parameter(
                image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ),
            ))
        })?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Overwrites one pixel.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the bitmap.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} bitmap",
            self.width,
            self.height
        );
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&rgba);
    }
}

/// Reads width and height from a PNG header without decoding pixels.
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = image::io::Reader::with_format(Cursor::new(bytes), ImageFormat::Png);
    Ok(reader.into_dimensions()?)
}
