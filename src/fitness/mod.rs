// Fitness module organization
// every comparator turns two equally-sized canonical rasters into one distance (lower = closer)

pub mod metrics;
pub mod precise;
pub mod sad;

pub use metrics::MetricsSnapshot;
pub use precise::precise_distance;
pub use sad::{fast_distance, sad_bytes};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::raster::RasterError;

/// which comparator scores candidates inside the loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// byte-wise SAD over the flat buffer (hot path)
    #[default]
    Fast,
    /// sqrt of summed squared 16-bit premultiplied differences
    Precise,
}

impl Metric {
    #[inline]
    pub fn distance(
        self,
        reference: &RgbaImage,
        candidate: &RgbaImage,
    ) -> Result<u64, RasterError> {
        match self {
            Metric::Fast => fast_distance(reference, candidate),
            Metric::Precise => precise_distance(reference, candidate),
        }
    }
}
