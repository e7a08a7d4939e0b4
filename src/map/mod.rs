mod choropleth;
mod geometry;
mod projection;
mod renderer;

pub use choropleth::classify_regions;
pub use projection::Viewport;
pub use renderer::{LineString, MapLayers, MapRenderer, Region};
