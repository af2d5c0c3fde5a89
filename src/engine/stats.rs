use std::path::PathBuf;
use std::time::Duration;

use crate::fitness::MetricsSnapshot;

/// per-generation statistics, computed after selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationStats {
    pub generation: u64,   // index of the generation just finished (0-based)
    pub elapsed: Duration, // wall time since the run started
    pub stale: u64,        // generations since the champion last improved
    pub best: u64,         // population[0] fitness after sorting
    pub worst: u64,        // population[P-1] fitness after sorting
    pub improved: bool,    // champion replaced this generation
}

impl GenerationStats {
    /// `metrics` must come from a SAD of the best member, not from `best` under another metric
    pub fn log(&self, metrics: MetricsSnapshot) {
        let m = metrics;
        log::info!(
            "dur: {:.2?}, gen: {}, stale: {}, best: {}, worst: {}, sad/px: {:.3}, psnr: {:.2}",
            self.elapsed,
            self.generation,
            self.stale,
            self.best,
            self.worst,
            m.sad_per_px,
            m.psnr
        );
    }
}

/// outcome of a finished run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub generations: u64,
    pub fitness: u64,
    pub destination: PathBuf,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn log(&self) {
        log::info!(
            "after {} generations, fitness is: {}, saved to {} ({:.2?}{})",
            self.generations,
            self.fitness,
            self.destination.display(),
            self.elapsed,
            if self.cancelled { ", cancelled" } else { "" }
        );
    }
}
