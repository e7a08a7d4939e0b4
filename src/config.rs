use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::imagery::{Boundary, BoundingBox, Palette, WmsLayer, GIBS_ENDPOINT};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Net photosynthesis over South America, year by year")]
pub struct Args {
    /// First year on the slider
    #[arg(long, default_value_t = 2005)]
    pub start_year: i32,

    /// Last year on the slider
    #[arg(long, default_value_t = 2024)]
    pub end_year: i32,

    /// Month of the yearly snapshot
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: u32,

    /// Day of the yearly snapshot
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day: u32,

    /// Imagery extent: south,west,north,east
    #[arg(long, default_value = "-41,-81.4,13,-34", allow_hyphen_values = true)]
    pub bbox: BoundingBox,

    /// Directory with country/subdivision GeoJSON files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// JSON file of historical events keyed by year, replaces the built-in list
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Log output (stdout is taken by the UI)
    #[arg(long, default_value = "canopy.log")]
    pub log_file: PathBuf,

    /// HTTP timeout for imagery requests
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Classify values equal to a bucket threshold into that bucket
    #[arg(long)]
    pub inclusive_buckets: bool,

    /// WMS endpoint
    #[arg(long, default_value = GIBS_ENDPOINT)]
    pub endpoint: Url,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn boundary(&self) -> Boundary {
        if self.inclusive_buckets {
            Boundary::Inclusive
        } else {
            Boundary::Exclusive
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::net_photosynthesis(self.boundary())
    }

    pub fn layer(&self) -> WmsLayer {
        WmsLayer {
            endpoint: self.endpoint.clone(),
            ..WmsLayer::default()
        }
    }
}
