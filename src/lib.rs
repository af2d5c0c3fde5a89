//! polygen: approximate a reference image with translucent polygons.
//!
//! the core is [`engine::Evolver`], an elitist (1+λ) evolution strategy that
//! mutates copies of the current champion in parallel every generation, scores
//! them with a raster distance from [`fitness`], and keeps only strict improvements.
//! anything implementing [`candidate::Candidate`] can be evolved; the bundled
//! [`candidate::PolygonCandidate`] renders polygons with tiny-skia.

pub mod candidate;
pub mod dna;
pub mod engine;
pub mod fitness;
pub mod mutate;
pub mod raster;
pub mod render;
pub mod settings;
pub mod sink;

pub use candidate::{Candidate, CandidateError, PolygonCandidate, Scored};
pub use engine::{EvolveError, Evolver, GenerationStats, RunSummary};
pub use fitness::{fast_distance, precise_distance, Metric};
pub use raster::{load_reference, normalize, RasterError};
pub use settings::{ConfigError, EvolveConfig, Settings, ShapeConfig};
pub use sink::{ChannelSink, LiveSink, PngSnapshotSink, SharedFrame};
