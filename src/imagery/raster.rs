use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use rayon::prelude::*;

use super::{ImageryError, Palette};

/// Class value for pixels left untouched (no data)
pub const NO_CLASS: u8 = u8::MAX;

/// True for the service's no-data pixels: fully transparent or pure black
#[inline(always)]
pub fn is_no_data(px: &[u8]) -> bool {
    px[3] == 0 || (px[0] == 0 && px[1] == 0 && px[2] == 0)
}

/// Per-pixel bucket indices left behind by a recolor pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassGrid {
    width: u32,
    height: u32,
    classes: Vec<u8>,
}

impl ClassGrid {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn class_at(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match self.classes[(y * self.width + x) as usize] {
            NO_CLASS => None,
            c => Some(c as usize),
        }
    }

    /// Number of pixels assigned to each bucket
    pub fn histogram(&self, buckets: usize) -> Vec<usize> {
        let mut counts = vec![0; buckets];
        for &c in &self.classes {
            if let Some(slot) = counts.get_mut(c as usize) {
                *slot += 1;
            }
        }
        counts
    }
}

/// Off-screen RGBA buffer at the output resolution
pub struct RasterBuffer {
    pixels: RgbaImage,
    classes: Vec<u8>,
}

impl RasterBuffer {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        let len = (pixels.width() * pixels.height()) as usize;
        Self { pixels, classes: vec![NO_CLASS; len] }
    }

    /// Draw a decoded image into a `width` x `height` buffer.
    /// Nearest-neighbour sampling keeps source colors intact for classification.
    pub fn draw(image: DynamicImage, width: u32, height: u32) -> Self {
        let rgba = image.into_rgba8();
        let pixels = if rgba.dimensions() == (width, height) {
            rgba
        } else {
            imageops::resize(&rgba, width, height, FilterType::Nearest)
        };
        Self::from_rgba(pixels)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Replace RGB of every data pixel with its bucket color, keyed on the green
    /// channel. Alpha is kept. Returns the number of recolored pixels.
    pub fn recolor(&mut self, palette: &Palette) -> usize {
        let width = self.pixels.width() as usize;
        if width == 0 {
            return 0;
        }
        let raw: &mut [u8] = &mut self.pixels;

        raw.par_chunks_mut(width * 4)
            .zip(self.classes.par_chunks_mut(width))
            .map(|(row, classes)| {
                let mut recolored = 0;
                for (px, class) in row.chunks_exact_mut(4).zip(classes.iter_mut()) {
                    if is_no_data(px) {
                        continue;
                    }
                    let bucket = palette.lookup(px[1]);
                    let [r, g, b] = palette.buckets()[bucket].color;
                    px[0] = r;
                    px[1] = g;
                    px[2] = b;
                    *class = bucket as u8;
                    recolored += 1;
                }
                recolored
            })
            .sum()
    }

    /// Encode as PNG
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageryError> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(
                self.pixels.as_raw(),
                self.pixels.width(),
                self.pixels.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(ImageryError::Encode)?;
        Ok(png)
    }

    pub fn into_classes(self) -> ClassGrid {
        ClassGrid {
            width: self.pixels.width(),
            height: self.pixels.height(),
            classes: self.classes,
        }
    }
}

/// Decode, recolor and re-encode one fetched image
pub fn recolor_image(
    bytes: &[u8],
    width: u32,
    height: u32,
    palette: &Palette,
    url: &str,
) -> Result<(Vec<u8>, ClassGrid), ImageryError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| ImageryError::Decode {
        url: url.to_string(),
        source,
    })?;
    let mut buffer = RasterBuffer::draw(decoded, width, height);
    let recolored = buffer.recolor(palette);
    tracing::debug!(recolored, width, height, "raster recolored");
    let png = buffer.encode_png()?;
    Ok((png, buffer.into_classes()))
}
