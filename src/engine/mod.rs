// Engine module organization
// elitist (1+λ) evolution strategy: slot 0 carries the champion, λ = P-1 mutants per generation

pub mod stats;

pub use stats::{GenerationStats, RunSummary};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rayon::prelude::*;

use crate::candidate::{Candidate, CandidateError, Scored};
use crate::fitness::{fast_distance, Metric, MetricsSnapshot};
use crate::raster::{normalize, RasterError};
use crate::settings::{ConfigError, EvolveConfig};
use crate::sink::LiveSink;

#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    #[error("invalid reference image: {0}")]
    Raster(#[from] RasterError),
    #[error("failed to create initial candidate: {0}")]
    Init(#[source] CandidateError),
    #[error("error comparing images in generation {generation}: {source}")]
    Evaluation { generation: u64, source: RasterError },
    #[error("failed to persist champion: {0}")]
    Persist(#[source] CandidateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct Evolver<C: Candidate> {
    cfg: EvolveConfig,
    reference: Arc<RgbaImage>,   // canonical, read-only for the whole run
    champion: Scored<C>,         // elitist incumbent, only the coordinator writes it
    population: Vec<Scored<C>>,  // always P entries, sorted ascending after each step
    rng: Pcg32,                  // coordinator RNG, hands out one seed per mutant
    pool: Option<rayon::ThreadPool>,
    cancel: Option<Arc<AtomicBool>>,
    generation: u64,             // generations completed
    stale: u64,                  // generations since the champion last improved
    started: Instant,
}

impl<C: Candidate> Evolver<C> {
    /// normalize the reference, build and score the initial champion, seed slot 0.
    /// `init` receives the reference width/height and the coordinator RNG.
    pub fn new<F>(cfg: EvolveConfig, reference: &DynamicImage, init: F) -> Result<Self, EvolveError>
    where
        F: FnOnce(u32, u32, &mut Pcg32) -> Result<C, CandidateError>,
    {
        profiling::scope!("Evolver::new");
        cfg.validate()?;

        // the loop keeps its own canonical copy, the caller's image stays untouched
        let reference = Arc::new(normalize(reference)?.into_owned());
        let (w, h) = reference.dimensions();

        let mut rng = Pcg32::seed_from_u64(cfg.seed);
        let first = init(w, h, &mut rng).map_err(EvolveError::Init)?;
        let fitness = cfg
            .metric
            .distance(&reference, first.raster())
            .map_err(|source| EvolveError::Evaluation { generation: 0, source })?;
        let champion = Scored::new(first, fitness);

        let pool = match cfg.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("evolve-{i}"))
                    .build()?,
            ),
            None => None,
        };

        log::debug!(
            "reference {}x{}, population {}, initial fitness {}",
            w, h, cfg.population, fitness
        );

        Ok(Self {
            population: vec![champion.clone(); cfg.population],
            cfg,
            reference,
            champion,
            rng,
            pool,
            cancel: None,
            generation: 0,
            stale: 0,
            started: Instant::now(),
        })
    }

    /// stop cleanly at the next generation boundary once the flag is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[inline]
    pub fn champion(&self) -> &Scored<C> {
        &self.champion
    }

    #[inline]
    pub fn population(&self) -> &[Scored<C>] {
        &self.population
    }

    #[inline]
    pub fn reference(&self) -> &RgbaImage {
        &self.reference
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn stale(&self) -> u64 {
        self.stale
    }

    #[inline]
    pub fn config(&self) -> &EvolveConfig {
        &self.cfg
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// one generation: fan-out mutants, join, sort, elitist accept, publish, report.
    pub fn step(&mut self, sinks: &[Arc<dyn LiveSink>]) -> Result<GenerationStats, EvolveError> {
        profiling::scope!("step");
        let generation = self.generation;

        // re-seed slot 0 explicitly instead of relying on the previous sort
        self.population[0] = self.champion.clone();

        // generate seeds up front so results don't depend on thread scheduling
        let seeds: Vec<u64> = (1..self.cfg.population).map(|_| self.rng.random::<u64>()).collect();

        let offspring = self
            .fan_out(&seeds)
            .map_err(|source| EvolveError::Evaluation { generation, source })?;
        for (slot, child) in self.population[1..].iter_mut().zip(offspring) {
            *slot = child;
        }

        // stable: among equal fitness the incumbent in slot 0 stays first
        self.population.sort_by_key(Scored::fitness);

        let curr_best = &self.population[0];
        let improved = curr_best.fitness < self.champion.fitness;
        if improved {
            self.champion = curr_best.clone();
            self.stale = 0;
        } else {
            self.stale += 1;
        }

        for (sink, member) in sinks.iter().zip(&self.population) {
            sink.update(member.candidate.raster());
        }

        self.generation += 1;

        let stats = GenerationStats {
            generation,
            elapsed: self.started.elapsed(),
            stale: self.stale,
            best: self.population[0].fitness,
            worst: self.population[self.population.len() - 1].fitness,
            improved,
        };
        if generation % self.cfg.report_every == 0 {
            let metrics = self
                .best_metrics()
                .map_err(|source| EvolveError::Evaluation { generation, source })?;
            stats.log(metrics);
        }
        Ok(stats)
    }

    /// copy + mutate + score one mutant per seed, all in parallel, joined before returning.
    /// workers only see the immutable champion and reference; each owns its copy.
    fn fan_out(&self, seeds: &[u64]) -> Result<Vec<Scored<C>>, RasterError> {
        profiling::scope!("fan_out");
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let champion: &C = &self.champion.candidate;
        let reference: &RgbaImage = &self.reference;
        let metric = self.cfg.metric;

        let work = || {
            seeds
                .par_iter()
                .map(|&seed| {
                    let mut child = champion.clone();
                    let mut rng = Pcg32::seed_from_u64(seed);
                    child.mutate(&mut rng);
                    let fitness = metric.distance(reference, child.raster())?;
                    Ok(Scored::new(child, fitness))
                })
                .collect::<Result<Vec<_>, RasterError>>()
        };

        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    /// run the remaining generations, then persist the champion to `destination`.
    /// on error nothing is written.
    pub fn run(
        &mut self,
        destination: &Path,
        sinks: &[Arc<dyn LiveSink>],
    ) -> Result<RunSummary, EvolveError> {
        profiling::scope!("run");
        let mut cancelled = false;

        while self.generation < self.cfg.max_generations {
            if self.is_cancelled() {
                log::warn!("cancelled at generation {}", self.generation);
                cancelled = true;
                break;
            }
            self.step(sinks)?;
        }

        self.champion.candidate.persist(destination).map_err(EvolveError::Persist)?;

        let summary = RunSummary {
            generations: self.generation,
            fitness: self.champion.fitness,
            destination: destination.to_path_buf(),
            elapsed: self.started.elapsed(),
            cancelled,
        };
        summary.log();
        Ok(summary)
    }

    /// SAD/px and PSNR of population[0]. under the fast metric its fitness already is the SAD,
    /// otherwise the SAD is computed here.
    pub fn best_metrics(&self) -> Result<MetricsSnapshot, RasterError> {
        let best = &self.population[0];
        let sad = match self.cfg.metric {
            Metric::Fast => best.fitness,
            Metric::Precise => fast_distance(&self.reference, best.candidate.raster())?,
        };
        Ok(MetricsSnapshot::from_sad(sad, self.num_pixels()))
    }

    #[inline]
    fn num_pixels(&self) -> usize {
        let (w, h) = self.reference.dimensions();
        w as usize * h as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::precise_distance;
    use crate::sink::SharedFrame;
    use image::Rgba;

    /// flat test candidate: mutate shifts the red channel of every pixel by up to ±step.
    #[derive(Clone, Debug)]
    struct Flat {
        raster: RgbaImage,
        step: i16,
        grow_on_mutate: bool,
    }

    impl Candidate for Flat {
        fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
            if self.grow_on_mutate {
                let (w, h) = self.raster.dimensions();
                self.raster = RgbaImage::new(w + 1, h);
                return;
            }
            let delta = rng.random_range(-self.step..=self.step);
            for p in self.raster.pixels_mut() {
                p.0[0] = (i16::from(p.0[0]) + delta).clamp(0, 255) as u8;
            }
        }

        fn raster(&self) -> &RgbaImage {
            &self.raster
        }

        fn persist(&self, path: &Path) -> Result<(), CandidateError> {
            self.raster.save(path)?;
            Ok(())
        }
    }

    fn reference() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255])))
    }

    fn flat(step: i16) -> impl FnOnce(u32, u32, &mut Pcg32) -> Result<Flat, CandidateError> {
        move |w: u32, h: u32, _rng: &mut Pcg32| {
            Ok(Flat {
                raster: RgbaImage::from_pixel(w, h, Rgba([0, 128, 128, 255])),
                step,
                grow_on_mutate: false,
            })
        }
    }

    fn cfg(population: usize, max_generations: u64) -> EvolveConfig {
        EvolveConfig { population, max_generations, report_every: 5, ..Default::default() }
    }

    #[test]
    fn initial_state() {
        let evo = Evolver::new(cfg(5, 10), &reference(), flat(8)).unwrap();
        // 16 pixels, red off by 128 each
        assert_eq!(evo.champion().fitness, 16 * 128);
        assert_eq!(evo.population().len(), 5);
        assert!(evo.population().iter().all(|m| m.same_as(evo.champion())));
        assert_eq!((evo.generation(), evo.stale()), (0, 0));
    }

    #[test]
    fn population_stays_sorted_and_champion_never_worsens() {
        let mut evo = Evolver::new(cfg(6, 100), &reference(), flat(16)).unwrap();
        let mut prev = evo.champion().fitness;
        for g in 0..40 {
            let stats = evo.step(&[]).unwrap();
            let pop = evo.population();
            assert_eq!(pop.len(), 6);
            assert!(pop.windows(2).all(|w| w[0].fitness <= w[1].fitness));
            assert_eq!(stats.best, pop[0].fitness);
            assert_eq!(stats.worst, pop[5].fitness);
            assert_eq!(stats.generation, g);

            let now = evo.champion().fitness;
            assert!(now <= prev);
            assert_eq!(now, prev.min(pop[0].fitness));
            assert_eq!(stats.improved, now < prev);
            prev = now;
        }
        assert!(prev < 16 * 128);
        assert_eq!(evo.generation(), 40);
    }

    #[test]
    fn stale_counter_resets_on_improvement() {
        let mut evo = Evolver::new(cfg(4, 100), &reference(), flat(16)).unwrap();
        let mut expected = 0;
        for _ in 0..30 {
            let stats = evo.step(&[]).unwrap();
            expected = if stats.improved { 0 } else { expected + 1 };
            assert_eq!(stats.stale, expected);
            assert_eq!(evo.stale(), expected);
        }
    }

    #[test]
    fn zero_generations_persists_initial_champion() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.png");
        let mut evo = Evolver::new(cfg(8, 0), &reference(), flat(8)).unwrap();
        let initial = evo.champion().clone();

        let summary = evo.run(&dest, &[]).unwrap();
        assert_eq!(summary.generations, 0);
        assert_eq!(summary.fitness, initial.fitness);
        assert!(!summary.cancelled);
        assert!(evo.champion().same_as(&initial));

        let written = image::open(&dest).unwrap().to_rgba8();
        assert_eq!(&written, initial.candidate.raster());
    }

    #[test]
    fn single_member_population_is_pure_carry_over() {
        let mut evo = Evolver::new(cfg(1, 20), &reference(), flat(8)).unwrap();
        let initial = evo.champion().clone();
        for g in 1..=20 {
            let stats = evo.step(&[]).unwrap();
            assert_eq!(evo.population().len(), 1);
            assert_eq!(stats.best, initial.fitness);
            assert_eq!(stats.worst, initial.fitness);
            assert_eq!(stats.stale, g);
            assert!(evo.champion().same_as(&initial));
        }
    }

    #[test]
    fn ties_keep_the_incumbent() {
        // step 0 = mutation is a no-op, every mutant ties the champion
        let mut evo = Evolver::new(cfg(5, 10), &reference(), flat(0)).unwrap();
        let initial = evo.champion().clone();
        for _ in 0..5 {
            let stats = evo.step(&[]).unwrap();
            assert!(!stats.improved);
            assert!(evo.population()[0].same_as(&initial));
            assert!(evo.champion().same_as(&initial));
        }
        assert_eq!(evo.stale(), 5);
    }

    #[test]
    fn mismatched_raster_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never.png");
        let init = |w: u32, h: u32, _: &mut Pcg32| {
            Ok(Flat { raster: RgbaImage::new(w, h), step: 1, grow_on_mutate: true })
        };
        let mut evo = Evolver::new(cfg(3, 10), &reference(), init).unwrap();

        let err = evo.run(&dest, &[]).unwrap_err();
        assert!(matches!(
            err,
            EvolveError::Evaluation { generation: 0, source: RasterError::BoundsMismatch { .. } }
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn wrong_sized_initial_candidate_rejected() {
        let init = |_: u32, _: u32, _: &mut Pcg32| {
            Ok(Flat { raster: RgbaImage::new(1, 1), step: 1, grow_on_mutate: false })
        };
        assert!(matches!(
            Evolver::new(cfg(3, 10), &reference(), init),
            Err(EvolveError::Evaluation { generation: 0, .. })
        ));
    }

    #[test]
    fn empty_reference_rejected() {
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(matches!(
            Evolver::new(cfg(3, 10), &empty, flat(1)),
            Err(EvolveError::Raster(RasterError::Empty(0, 0)))
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(matches!(
            Evolver::new(cfg(0, 10), &reference(), flat(1)),
            Err(EvolveError::Config(_))
        ));
    }

    #[test]
    fn sinks_receive_population_in_rank_order() {
        let sinks: Vec<Arc<SharedFrame>> = (0..3).map(|_| Arc::new(SharedFrame::new())).collect();
        let dyn_sinks: Vec<Arc<dyn LiveSink>> =
            sinks.iter().map(|s| Arc::clone(s) as Arc<dyn LiveSink>).collect();

        let mut evo = Evolver::new(cfg(5, 10), &reference(), flat(16)).unwrap();
        evo.step(&dyn_sinks).unwrap();
        for (i, sink) in sinks.iter().enumerate() {
            assert_eq!(sink.latest().unwrap().as_ref(), evo.population()[i].candidate.raster());
        }
    }

    #[test]
    fn more_sinks_than_members_is_fine() {
        let dyn_sinks: Vec<Arc<dyn LiveSink>> =
            (0..4).map(|_| Arc::new(SharedFrame::new()) as Arc<dyn LiveSink>).collect();
        let mut evo = Evolver::new(cfg(2, 10), &reference(), flat(4)).unwrap();
        evo.step(&dyn_sinks).unwrap();
    }

    #[test]
    fn cancelled_run_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("partial.png");
        let flag = Arc::new(AtomicBool::new(true));
        let mut evo = Evolver::new(cfg(4, 1_000), &reference(), flat(4)).unwrap().with_cancel(flag);

        let summary = evo.run(&dest, &[]).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.generations, 0);
        assert!(dest.exists());
    }

    #[test]
    fn same_seed_same_result_on_any_pool() {
        let run = |threads| {
            let cfg = EvolveConfig { threads, ..cfg(6, 25) };
            let mut evo = Evolver::new(cfg, &reference(), flat(16)).unwrap();
            for _ in 0..25 {
                evo.step(&[]).unwrap();
            }
            (evo.champion().fitness, evo.champion().candidate.raster().clone())
        };
        assert_eq!(run(None), run(Some(2)));
        assert_eq!(run(Some(1)), run(Some(3)));
    }

    #[test]
    fn precise_metric_scores_the_loop() {
        let cfg = EvolveConfig { metric: Metric::Precise, ..cfg(4, 10) };
        let mut evo = Evolver::new(cfg, &reference(), flat(16)).unwrap();
        let expected =
            precise_distance(evo.reference(), evo.champion().candidate.raster()).unwrap();
        assert_eq!(evo.champion().fitness, expected);

        for _ in 0..10 {
            evo.step(&[]).unwrap();
        }
        let champ = evo.champion();
        let rescored = precise_distance(evo.reference(), champ.candidate.raster()).unwrap();
        assert_eq!(champ.fitness, rescored);
    }

    #[test]
    fn precise_metric_reports_sad_based_metrics() {
        let black = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255])));
        let cfg = EvolveConfig { metric: Metric::Precise, ..cfg(4, 10) };
        let mut evo = Evolver::new(cfg, &black, flat(16)).unwrap();
        evo.step(&[]).unwrap();

        let best = &evo.population()[0];
        let sad = fast_distance(evo.reference(), best.candidate.raster()).unwrap();
        assert_ne!(sad, best.fitness);
        assert_eq!(evo.best_metrics().unwrap(), MetricsSnapshot::from_sad(sad, 16 * 16));
    }

    #[test]
    fn fast_metric_reports_fitness_as_sad() {
        let mut evo = Evolver::new(cfg(4, 10), &reference(), flat(16)).unwrap();
        evo.step(&[]).unwrap();
        let best = evo.population()[0].fitness;
        assert_eq!(evo.best_metrics().unwrap(), MetricsSnapshot::from_sad(best, 16));
    }

    #[test]
    fn non_rgba_reference_is_normalized() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([128])));
        let evo = Evolver::new(cfg(2, 1), &gray, flat(1)).unwrap();
        assert_eq!(evo.reference().get_pixel(0, 0).0, [128, 128, 128, 255]);
        assert_eq!(evo.champion().fitness, 16 * 128);
    }
}
