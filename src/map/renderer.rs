use crate::braille::BrailleCanvas;
use crate::map::geometry::{draw_line, fill_ring};
use crate::map::projection::Viewport;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// A country outline: exterior rings of each of its polygons
#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    /// ISO 3166-1 numeric code, zero padded ("076")
    pub code: String,
    pub rings: Vec<LineString>,
}

impl Region {
    /// (min_lon, min_lat, max_lon, max_lat) over all rings
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.rings.iter().flatten();
        let &(lon, lat) = points.next()?;
        Some(points.fold((lon, lat, lon, lat), |(a, b, c, d), &(x, y)| {
            (a.min(x), b.min(y), c.max(x), d.max(y))
        }))
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.rings
            .iter()
            .any(|ring| crate::map::geometry::point_in_ring(lon, lat, ring))
    }
}

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_borders: bool,
    pub show_subdivisions: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_borders: true,
            show_subdivisions: true,
        }
    }
}

/// Braille layers produced for one frame
pub struct MapLayers {
    pub borders: BrailleCanvas,
    pub subdivisions: BrailleCanvas,
}

/// Country and subdivision outlines
pub struct MapRenderer {
    pub regions: Vec<Region>,
    pub subdivisions: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            subdivisions: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    /// Render outline layers into canvases of `width` x `height` characters
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport) -> MapLayers {
        let mut borders = BrailleCanvas::new(width, height);
        let mut subdivisions = BrailleCanvas::new(width, height);

        if self.settings.show_subdivisions {
            for line in &self.subdivisions {
                draw_linestring(&mut subdivisions, line, viewport);
            }
        }

        if self.settings.show_borders {
            for region in &self.regions {
                for ring in &region.rings {
                    draw_linestring(&mut borders, ring, viewport);
                }
            }
        }

        MapLayers { borders, subdivisions }
    }

    /// One filled canvas per class; regions whose class is `None` are skipped.
    /// `classes` is parallel to `self.regions`.
    pub fn render_fills(
        &self,
        width: usize,
        height: usize,
        viewport: &Viewport,
        classes: &[Option<usize>],
        class_count: usize,
    ) -> Vec<BrailleCanvas> {
        let mut fills: Vec<BrailleCanvas> = (0..class_count).map(|_| BrailleCanvas::new(width, height)).collect();

        for (region, class) in self.regions.iter().zip(classes) {
            let Some(canvas) = class.and_then(|c| fills.get_mut(c)) else {
                continue;
            };
            for ring in &region.rings {
                let projected: Vec<(i32, i32)> = ring.iter().map(|&(lon, lat)| viewport.project(lon, lat)).collect();
                fill_ring(canvas, &projected);
            }
        }

        fills
    }

    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub fn add_subdivision(&mut self, line: LineString) {
        self.subdivisions.push(line);
    }

    /// Check if any data is loaded
    pub fn has_data(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn toggle_borders(&mut self) {
        self.settings.show_borders = !self.settings.show_borders;
    }

    pub fn toggle_subdivisions(&mut self) {
        self.settings.show_subdivisions = !self.settings.show_subdivisions;
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a linestring with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
    if line.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;

    for &(lon, lat) in line {
        let (px, py) = viewport.project(lon, lat);

        if let Some((prev_x, prev_y)) = prev {
            // Skip segments that wrap across the antimeridian
            let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
            if dist < viewport.width.max(viewport.height) * 2 && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        }

        prev = Some((px, py));
    }
}
