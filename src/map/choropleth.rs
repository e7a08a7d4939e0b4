use rayon::prelude::*;

use crate::imagery::{BoundingBox, ClassGrid};
use crate::map::renderer::Region;

/// Modal imagery class of each region, sampled from the class grid at pixel
/// centers inside the region. `None` where no classified pixel falls inside.
pub fn classify_regions(
    regions: &[Region],
    grid: &ClassGrid,
    bbox: &BoundingBox,
    class_count: usize,
) -> Vec<Option<usize>> {
    regions
        .par_iter()
        .map(|region| modal_class(region, grid, bbox, class_count))
        .collect()
}

fn modal_class(region: &Region, grid: &ClassGrid, bbox: &BoundingBox, class_count: usize) -> Option<usize> {
    let (min_lon, min_lat, max_lon, max_lat) = region.bounds()?;
    let (w, h) = (grid.width(), grid.height());
    if w == 0 || h == 0 || class_count == 0 {
        return None;
    }
    let lon_step = bbox.width_deg() / w as f64;
    let lat_step = bbox.height_deg() / h as f64;

    // Pixel window covering the region's bounds, clipped to the grid
    let col = |lon: f64| ((lon - bbox.west) / lon_step).floor().clamp(0.0, (w - 1) as f64) as u32;
    let row = |lat: f64| ((bbox.north - lat) / lat_step).floor().clamp(0.0, (h - 1) as f64) as u32;
    if max_lon < bbox.west || min_lon > bbox.east || max_lat < bbox.south || min_lat > bbox.north {
        return None;
    }

    let mut counts = vec![0usize; class_count];
    for y in row(max_lat)..=row(min_lat) {
        let lat = bbox.north - (y as f64 + 0.5) * lat_step;
        for x in col(min_lon)..=col(max_lon) {
            let Some(class) = grid.class_at(x, y) else {
                continue;
            };
            let lon = bbox.west + (x as f64 + 0.5) * lon_step;
            if class < class_count && region.contains(lon, lat) {
                counts[class] += 1;
            }
        }
    }

    // Ties go to the lower class
    let (best, &count) = counts
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    (count > 0).then_some(best)
}
