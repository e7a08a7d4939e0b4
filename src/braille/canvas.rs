/// Dot bit for each (x % 2, y % 4) position inside a braille cell
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

/// Braille Unicode canvas. Each character cell is a 2x4 dot grid,
/// so a `w` x `h` canvas has `2w` x `4h` addressable pixels.
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    cells: Vec<u8>,
}

impl BrailleCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0u8; width * height],
        }
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Set a dot; out-of-range coordinates are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return;
        }
        self.cells[cy * self.width + cx] |= DOT_BITS[x % 2][y % 4];
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// Non-blank cells as (column, row, glyph)
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.cells.iter().enumerate().filter(|&(_, &bits)| bits != 0).map(|(i, &bits)| {
            (i % self.width, i / self.width, glyph(bits))
        })
    }

    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|&b| glyph(b)).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[inline(always)]
fn glyph(bits: u8) -> char {
    char::from_u32(0x2800 + bits as u32).unwrap_or(' ')
}
