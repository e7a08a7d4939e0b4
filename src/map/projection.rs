use crate::imagery::BoundingBox;

/// Plate carrée viewport, so borders line up with EPSG:4326 imagery
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-90 to 90)
    pub center_lat: f64,
    /// Zoom level (1.0 = home extent fits the canvas)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
    /// Home extent in degrees (lon span, lat span)
    pub extent: (f64, f64),
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize, extent: (f64, f64)) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
            extent,
        }
    }

    /// Fit a bounding box into the canvas at zoom 1
    pub fn fit(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        let (lon, lat) = bbox.center();
        Self::new(lon, lat, 1.0, width, height, (bbox.width_deg(), bbox.height_deg()))
    }

    /// Degrees covered by one canvas pixel
    pub fn degrees_per_pixel(&self) -> f64 {
        let w = self.width.max(1) as f64;
        let h = self.height.max(1) as f64;
        (self.extent.0 / w).max(self.extent.1 / h) / self.zoom
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let dpp = self.degrees_per_pixel();
        self.center_lon += dx as f64 * dpp;
        self.center_lat -= dy as f64 * dpp;

        // Wrap longitude
        if self.center_lon > 180.0 {
            self.center_lon -= 360.0;
        } else if self.center_lon < -180.0 {
            self.center_lon += 360.0;
        }

        self.center_lat = self.center_lat.clamp(-90.0, 90.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.5).min(50.0);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 1.5).max(0.5);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.5);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / 1.5);
    }

    /// Zoom by factor, keeping the point under the cursor fixed
    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(0.5, 50.0);

        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Pixel -> (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let dpp = self.degrees_per_pixel();
        let lon = self.center_lon + (px as f64 - self.width as f64 / 2.0) * dpp;
        let lat = self.center_lat - (py as f64 - self.height as f64 / 2.0) * dpp;
        (lon, lat)
    }

    /// (lon, lat) -> pixel
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let dpp = self.degrees_per_pixel();
        let px = ((lon - self.center_lon) / dpp + self.width as f64 / 2.0).round() as i32;
        let py = ((self.center_lat - lat) / dpp + self.height as f64 / 2.0).round() as i32;
        (px, py)
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0
            && min_x < self.width as i32
            && max_y >= 0
            && min_y < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let vp = Viewport::fit(&BoundingBox::AMAZON, 100, 100);
        let (lon, lat) = BoundingBox::AMAZON.center();
        assert_eq!(vp.project(lon, lat), (50, 50));
    }

    #[test]
    fn test_fit_keeps_bbox_on_canvas() {
        let bbox = BoundingBox::AMAZON;
        let vp = Viewport::fit(&bbox, 80, 100);
        for (lon, lat) in [(bbox.west, bbox.north), (bbox.east, bbox.south)] {
            let (px, py) = vp.project(lon, lat);
            assert!((0..=80).contains(&px), "px {px}");
            assert!((0..=100).contains(&py), "py {py}");
        }
    }

    #[test]
    fn test_unproject_inverts_project() {
        let vp = Viewport::fit(&BoundingBox::AMAZON, 200, 240);
        let (lon, lat) = vp.unproject(37, 190);
        assert_eq!(vp.project(lon, lat), (37, 190));
    }

    #[test]
    fn test_pan() {
        let mut vp = Viewport::fit(&BoundingBox::AMAZON, 100, 100);
        let before = vp.center_lon;
        vp.pan(10, 0);
        assert!(vp.center_lon > before);
        vp.pan(0, -100_000);
        assert_eq!(vp.center_lat, 90.0);
    }

    #[test]
    fn test_zoom_at_keeps_cursor_point() {
        let mut vp = Viewport::fit(&BoundingBox::AMAZON, 200, 200);
        let target = vp.unproject(40, 60);
        vp.zoom_in_at(40, 60);
        let (px, py) = vp.project(target.0, target.1);
        assert!((px - 40).abs() <= 1 && (py - 60).abs() <= 1);
    }
}
