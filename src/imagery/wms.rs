use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use reqwest::Url;

/// NASA GIBS WMS endpoint (EPSG:4326, best available)
pub const GIBS_ENDPOINT: &str = "https://gibs.earthdata.nasa.gov/wms/epsg4326/best/wms.cgi";
pub const NET_PHOTOSYNTHESIS_LAYER: &str = "MODIS_Aqua_L4_Net_Photosynthesis_8Day";
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 1000;

static GIBS_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(GIBS_ENDPOINT).expect("GIBS endpoint constant is a valid URL"));

/// Geographic extent in degrees, serialized as `south,west,north,east`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundingBoxError {
    Malformed(String),
    Empty { south: f64, west: f64, north: f64, east: f64 },
}

impl fmt::Display for BoundingBoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundingBoxError::Malformed(input) => {
                write!(f, "expected four comma-separated numbers south,west,north,east, got {input:?}")
            }
            BoundingBoxError::Empty { south, west, north, east } => {
                write!(f, "bounding box {south},{west},{north},{east} has no area")
            }
        }
    }
}

impl std::error::Error for BoundingBoxError {}

impl BoundingBox {
    /// The Amazon basin and most of South America
    pub const AMAZON: BoundingBox = BoundingBox { south: -41.0, west: -81.4, north: 13.0, east: -34.0 };

    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, BoundingBoxError> {
        let finite = [south, west, north, east].iter().all(|v| v.is_finite());
        if !finite || south >= north || west >= east {
            return Err(BoundingBoxError::Empty { south, west, north, east });
        }
        Ok(Self { south, west, north, east })
    }

    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Center as (lon, lat)
    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::AMAZON
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| BoundingBoxError::Malformed(s.to_string()))?;
        match parts.as_slice() {
            &[south, west, north, east] => Self::new(south, west, north, east),
            _ => Err(BoundingBoxError::Malformed(s.to_string())),
        }
    }
}

/// Fixed GetMap parameters for one imagery layer
#[derive(Clone, Debug)]
pub struct WmsLayer {
    pub endpoint: Url,
    pub layer: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WmsLayer {
    fn default() -> Self {
        Self {
            endpoint: GIBS_URL.clone(),
            layer: NET_PHOTOSYNTHESIS_LAYER.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl WmsLayer {
    /// WMS 1.3.0 GetMap URL for a date and extent
    pub fn request_url(&self, date: &str, bbox: &BoundingBox) -> String {
        let bbox = bbox.to_string();
        let width = self.width.to_string();
        let height = self.height.to_string();

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().clear().extend_pairs([
            ("service", "WMS"),
            ("version", "1.3.0"),
            ("request", "GetMap"),
            ("layers", self.layer.as_str()),
            ("styles", ""),
            ("format", "image/png"),
            ("transparent", "true"),
            ("crs", "EPSG:4326"),
            ("bbox", bbox.as_str()),
            ("width", width.as_str()),
            ("height", height.as_str()),
            ("time", date),
        ]);
        url.into()
    }
}

/// GetMap URL for the default GIBS layer
pub fn build_request_url(date: &str, bbox: &BoundingBox) -> String {
    WmsLayer::default().request_url(date, bbox)
}
