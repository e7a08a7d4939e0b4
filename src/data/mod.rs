use crate::map::{LineString, MapRenderer, Region};
use anyhow::Result;
use geojson::feature::Id;
use geojson::{Feature, GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// ISO 3166-1 numeric codes of the South American countries
pub const SOUTH_AMERICA_CODES: [&str; 12] = [
    "032", "068", "076", "152", "170", "218", "328", "600", "604", "740", "858", "862",
];

/// ISO 3166-1 alpha-3 codes for the same countries, used by subdivision files
pub const SOUTH_AMERICA_A3: [&str; 12] = [
    "ARG", "BOL", "BRA", "CHL", "COL", "ECU", "GUY", "PRY", "PER", "SUR", "URY", "VEN",
];

const COUNTRY_FILES: [&str; 3] = [
    "countries.geojson",
    "ne_50m_admin_0_countries.json",
    "ne_110m_admin_0_countries.json",
];

const SUBDIVISION_FILES: [&str; 2] = ["subdivisions.geojson", "ne_10m_admin_1_states_provinces.json"];

/// Load country and subdivision outlines from `data_dir`. The first country
/// file found wins; missing or broken files are logged and skipped.
pub fn load_boundaries(renderer: &mut MapRenderer, data_dir: &Path) -> Result<()> {
    for filename in COUNTRY_FILES {
        let path = data_dir.join(filename);
        if !path.exists() {
            continue;
        }
        match load_countries(renderer, &path) {
            Ok(count) => {
                info!(file = filename, count, "loaded country outlines");
                break;
            }
            Err(e) => warn!(file = filename, error = %e, "failed to load countries"),
        }
    }

    for filename in SUBDIVISION_FILES {
        let path = data_dir.join(filename);
        if !path.exists() {
            continue;
        }
        match load_subdivisions(renderer, &path) {
            Ok(count) => {
                info!(file = filename, count, "loaded subdivision outlines");
                break;
            }
            Err(e) => warn!(file = filename, error = %e, "failed to load subdivisions"),
        }
    }

    Ok(())
}

/// Load South American countries from a GeoJSON file; returns how many were kept
pub fn load_countries(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    let mut kept = 0;

    for feature in features(geojson) {
        let Some(code) = country_code(&feature) else {
            continue;
        };
        if !SOUTH_AMERICA_CODES.contains(&code.as_str()) {
            continue;
        }
        let name = ["name", "NAME", "ADMIN"]
            .iter()
            .find_map(|key| feature.property(key).and_then(|v| v.as_str()))
            .unwrap_or(code.as_str())
            .to_string();

        let mut rings = Vec::new();
        if let Some(geometry) = &feature.geometry {
            collect_exteriors(geometry, &mut |ring| rings.push(ring));
        }
        if rings.is_empty() {
            continue;
        }
        renderer.add_region(Region { name, code, rings });
        kept += 1;
    }

    Ok(kept)
}

/// Load subdivision outlines. Features tagged with a country outside South
/// America are dropped; untagged features are assumed pre-filtered.
pub fn load_subdivisions(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    let mut kept = 0;

    for feature in features(geojson) {
        let country = ["adm0_a3", "ADM0_A3", "iso_a3"]
            .iter()
            .find_map(|key| feature.property(key).and_then(|v| v.as_str()));
        if country.is_some_and(|a3| !SOUTH_AMERICA_A3.contains(&a3)) {
            continue;
        }
        if let Some(geometry) = &feature.geometry {
            collect_exteriors(geometry, &mut |line| {
                renderer.add_subdivision(line);
                kept += 1;
            });
        }
    }

    Ok(kept)
}

fn features(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature::from(g)],
    }
}

/// Zero-padded numeric code from the feature id or ISO_N3-style properties
fn country_code(feature: &Feature) -> Option<String> {
    let raw = match &feature.id {
        Some(Id::String(s)) => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => ["ISO_N3", "iso_n3"]
            .iter()
            .find_map(|key| feature.property(key))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())),
    }?;
    let numeric: u16 = raw.trim().parse().ok()?;
    Some(format!("{numeric:03}"))
}

/// Exterior ring of every polygon in the geometry; line geometries are passed through
fn collect_exteriors<F>(geometry: &Geometry, add: &mut F)
where
    F: FnMut(LineString),
{
    let to_line = |coords: &Vec<Vec<f64>>| -> LineString { coords.iter().map(|c| (c[0], c[1])).collect() };

    match &geometry.value {
        Value::LineString(coords) => add(to_line(coords)),
        Value::MultiLineString(lines) => lines.iter().for_each(|l| add(to_line(l))),
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_exteriors(g, add);
            }
        }
        _ => {}
    }
}

/// Coarse continent outline used when no boundary files are available
pub fn generate_south_america(renderer: &mut MapRenderer) {
    renderer.add_region(Region {
        name: "South America".to_string(),
        code: "005".to_string(),
        rings: vec![vec![
            (-80.0, 10.0), (-75.0, 11.0), (-70.0, 12.0), (-62.0, 10.5),
            (-57.0, 6.0), (-51.0, 4.0), (-50.0, 0.0), (-44.0, -2.5),
            (-35.0, -5.0), (-35.0, -10.0), (-39.0, -15.0), (-40.0, -22.0),
            (-48.0, -25.5), (-53.0, -33.0), (-58.0, -38.0), (-65.0, -42.0),
            (-68.0, -50.0), (-75.0, -52.0), (-75.0, -45.0), (-73.5, -40.0),
            (-71.5, -30.0), (-70.3, -18.0), (-76.0, -14.0), (-81.0, -5.0),
            (-80.0, 0.0), (-79.0, 8.0), (-80.0, 10.0),
        ]],
    });
}
