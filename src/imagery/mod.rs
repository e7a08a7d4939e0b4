//! Time-stamped WMS imagery recolored into discrete productivity classes.
//!
//! A request runs fetch -> decode -> recolor -> encode on its own worker
//! thread and hands the result to a [`DisplaySink`]. Any failure degrades to
//! showing the raw service image instead.

mod palette;
mod raster;
mod recolorer;
mod source;
mod wms;

pub use palette::{Boundary, Palette, PaletteError, PixelBucket, MAX_BUCKETS, NO_ACTIVITY_COLOR};
pub use raster::{is_no_data, recolor_image, ClassGrid, RasterBuffer, NO_CLASS};
pub use recolorer::{DisplayImage, DisplaySink, ImageFrame, RasterRecolorer};
pub use source::{HttpImageSource, ImageSource};
pub use wms::{
    build_request_url, BoundingBox, BoundingBoxError, WmsLayer, DEFAULT_HEIGHT, DEFAULT_WIDTH,
    GIBS_ENDPOINT, NET_PHOTOSYNTHESIS_LAYER,
};

use std::fmt;

#[derive(Debug)]
pub enum ImageryError {
    /// Network failure or non-success HTTP status
    Fetch { url: String, reason: String },
    /// The response was not a readable image
    Decode { url: String, source: image::ImageError },
    /// Re-encoding the recolored buffer failed
    Encode(image::ImageError),
}

impl fmt::Display for ImageryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageryError::Fetch { url, reason } => write!(f, "failed to fetch {url}: {reason}"),
            ImageryError::Decode { url, source } => write!(f, "failed to decode {url}: {source}"),
            ImageryError::Encode(e) => write!(f, "failed to encode recolored image: {e}"),
        }
    }
}

impl std::error::Error for ImageryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageryError::Fetch { .. } => None,
            ImageryError::Decode { source, .. } => Some(source),
            ImageryError::Encode(e) => Some(e),
        }
    }
}
