use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use polygen::{
    load_reference, Evolver, LiveSink, Metric, PngSnapshotSink, PolygonCandidate, Settings,
};

/// approximate an image with translucent polygons
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// reference image (png, jpeg, gif, ...)
    reference: PathBuf,

    /// where the final render is written (format from extension)
    destination: PathBuf,

    /// JSON settings file; command-line values override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// generations to run
    #[arg(long, short = 'g')]
    generations: Option<u64>,

    /// population size (champion + mutants)
    #[arg(long, short = 'p')]
    population: Option<usize>,

    /// log statistics every N generations
    #[arg(long)]
    report_every: Option<u64>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// bound the worker pool to N threads
    #[arg(long)]
    threads: Option<usize>,

    /// polygons per candidate
    #[arg(long)]
    polygons: Option<usize>,

    /// score with the precise (sqrt of squared 16-bit differences) metric
    #[arg(long)]
    precise: bool,

    /// write the best-of-generation render into this directory
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// only write every N-th preview
    #[arg(long, default_value_t = 100)]
    preview_every: u64,

    /// also write the champion genome as JSON
    #[arg(long)]
    genome_json: Option<PathBuf>,
}

fn load_settings(cli: &Cli) -> Result<Settings, polygen::ConfigError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let evolve = &mut settings.evolve;
    if let Some(g) = cli.generations {
        evolve.max_generations = g;
    }
    if let Some(p) = cli.population {
        evolve.population = p;
    }
    if let Some(k) = cli.report_every {
        evolve.report_every = k;
    }
    if let Some(s) = cli.seed {
        evolve.seed = s;
    }
    if cli.threads.is_some() {
        evolve.threads = cli.threads;
    }
    if cli.precise {
        evolve.metric = Metric::Precise;
    }
    if let Some(n) = cli.polygons {
        settings.shapes.polygons = n;
    }

    settings.validate()?;
    Ok(settings)
}

fn run(cli: &Cli, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let reference = load_reference(&cli.reference)
        .map_err(|e| format!("failed to read {}: {}", cli.reference.display(), e))?;
    log::info!(
        "loaded {} ({}x{})",
        cli.reference.display(),
        reference.width(),
        reference.height()
    );

    let shapes = Arc::new(settings.shapes);
    let mut evolver = Evolver::new(settings.evolve, &reference, |w, h, rng| {
        PolygonCandidate::random(w, h, Arc::clone(&shapes), rng)
    })?;

    let mut sinks: Vec<Arc<dyn LiveSink>> = Vec::new();
    if let Some(dir) = &cli.preview_dir {
        std::fs::create_dir_all(dir)?;
        sinks.push(Arc::new(PngSnapshotSink::new(dir, "best", cli.preview_every)));
    }

    evolver.run(&cli.destination, &sinks)?;

    if let Some(path) = &cli.genome_json {
        write_genome(evolver.champion().candidate.as_ref(), path)?;
    }
    Ok(())
}

fn write_genome(champion: &PolygonCandidate, path: &Path) -> Result<(), polygen::CandidateError> {
    champion.write_genome_json(path)?;
    log::info!("genome written to {}", path.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // configure Rayon's global thread pool once at startup so worker threads get nice names
    // like "rayon-0".
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&cli, settings) {
        log::error!("{}", e);
        process::exit(1);
    }
}
