//! the contract the evolution loop needs from a candidate, plus the bundled polygon candidate.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use rand::Rng;

use crate::dna::Genome;
use crate::mutate::mutate_genome;
use crate::render::CpuRenderer;
use crate::settings::ShapeConfig;

#[derive(Debug, thiserror::Error)]
pub enum CandidateError {
    #[error("cannot create a {0}x{1} canvas")]
    Canvas(u32, u32),
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode genome: {0}")]
    Json(#[from] serde_json::Error),
}

/// one rendered attempt at the reference image.
///
/// `Clone` is the deep copy: a clone must not share mutable state with its source,
/// so workers can mutate their copies without locks.
pub trait Candidate: Clone + Send + Sync {
    /// perturb the representation in place and refresh the raster.
    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R);

    /// current rendering, same size as the reference for the whole run.
    fn raster(&self) -> &RgbaImage;

    /// write the rendering to `path`.
    fn persist(&self, path: &Path) -> Result<(), CandidateError>;
}

/// a candidate together with its fitness (lower is better).
/// only the loop builds these, after scoring, so nothing unevaluated can be ranked.
#[derive(Debug)]
pub struct Scored<C> {
    pub candidate: Arc<C>,
    pub fitness: u64,
}

// manual impl: cloning is a reference swap, C itself need not be cloned
impl<C> Clone for Scored<C> {
    fn clone(&self) -> Self {
        Self { candidate: Arc::clone(&self.candidate), fitness: self.fitness }
    }
}

impl<C> Scored<C> {
    pub fn new(candidate: C, fitness: u64) -> Self {
        Self { candidate: Arc::new(candidate), fitness }
    }

    #[inline]
    pub fn fitness(&self) -> u64 {
        self.fitness
    }

    #[inline]
    pub fn set_fitness(&mut self, fitness: u64) {
        self.fitness = fitness;
    }

    /// true if both entries point at the same candidate instance
    #[inline]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.candidate, &other.candidate)
    }
}

/// translucent polygons over a white canvas, rendered with tiny-skia.
#[derive(Clone, Debug)]
pub struct PolygonCandidate {
    pub genome: Genome,
    cfg: Arc<ShapeConfig>,
    raster: RgbaImage,
}

impl PolygonCandidate {
    /// random genome of `cfg.polygons` polygons on a width x height canvas
    pub fn random<R: Rng + ?Sized>(
        width: u32,
        height: u32,
        cfg: Arc<ShapeConfig>,
        rng: &mut R,
    ) -> Result<Self, CandidateError> {
        profiling::scope!("PolygonCandidate::random");
        let genome = Genome::random(rng, width, height, &cfg);
        Self::from_genome(genome, cfg)
    }

    pub fn from_genome(genome: Genome, cfg: Arc<ShapeConfig>) -> Result<Self, CandidateError> {
        let raster = CpuRenderer::render(&genome)
            .ok_or(CandidateError::Canvas(genome.width, genome.height))?;
        Ok(Self { genome, cfg, raster })
    }

    /// write the genome as pretty JSON (for re-rendering at another resolution later)
    pub fn write_genome_json(&self, path: &Path) -> Result<(), CandidateError> {
        let json = serde_json::to_string_pretty(&self.genome)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Candidate for PolygonCandidate {
    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        profiling::scope!("PolygonCandidate::mutate");
        let kind = mutate_genome(&mut self.genome, rng, &self.cfg);
        log::trace!("applied {kind:?}");
        match CpuRenderer::render(&self.genome) {
            Some(raster) => self.raster = raster,
            // only reachable if the genome's canvas was edited to zero after construction
            None => log::warn!(
                "render of {}x{} canvas failed, raster left stale",
                self.genome.width,
                self.genome.height
            ),
        }
    }

    #[inline]
    fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    fn persist(&self, path: &Path) -> Result<(), CandidateError> {
        profiling::scope!("PolygonCandidate::persist");
        // format is picked from the extension
        self.raster.save(path)?;
        Ok(())
    }
}
