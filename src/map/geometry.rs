use crate::braille::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Scanline fill of a closed ring given in pixel coordinates (even-odd rule),
/// clipped to the canvas
pub fn fill_ring(canvas: &mut BrailleCanvas, ring: &[(i32, i32)]) {
    if ring.len() < 3 {
        return;
    }
    let max_x = canvas.pixel_width() as i32;
    let min_row = ring.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_row = ring.iter().map(|p| p.1).max().unwrap_or(0).min(canvas.pixel_height() as i32 - 1);

    let mut crossings: Vec<i32> = Vec::new();
    for y in min_row..=max_row {
        crossings.clear();
        let yc = y as f64 + 0.5;
        for (i, &(x0, y0)) in ring.iter().enumerate() {
            let (x1, y1) = ring[(i + 1) % ring.len()];
            let (fy0, fy1) = (y0 as f64, y1 as f64);
            if (fy0 <= yc) != (fy1 <= yc) {
                let t = (yc - fy0) / (fy1 - fy0);
                crossings.push((x0 as f64 + t * (x1 - x0) as f64).round() as i32);
            }
        }
        crossings.sort_unstable();
        for pair in crossings.chunks_exact(2) {
            for x in pair[0].max(0)..pair[1].min(max_x) {
                canvas.set_pixel_signed(x, y);
            }
        }
    }
}

/// Even-odd point-in-polygon test on a lon/lat ring
pub fn point_in_ring(lon: f64, lat: f64, ring: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
