/// run settings for polygen.
/// loaded from an optional JSON file, then overridden from the command line.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fitness::Metric;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// evolution loop parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    pub population: usize,       // P: slot 0 = champion, P-1 offspring per generation
    pub max_generations: u64,
    pub report_every: u64,       // K: stats line every K generations
    pub seed: u64,               // master seed for the coordinator RNG
    pub threads: Option<usize>,  // bound the fan-out to a dedicated pool (None = rayon global pool)
    pub metric: Metric,
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            population: 16,
            max_generations: 10_000,
            report_every: 10,
            seed: 0xDEADBEEF,
            threads: None,
            metric: Metric::Fast,
        }
    }
}

impl EvolveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::Invalid("population must be at least 1".into()));
        }
        if self.report_every == 0 {
            return Err(ConfigError::Invalid("report_every must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1 when set".into()));
        }
        Ok(())
    }
}

/// parameters for the bundled polygon candidate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub polygons: usize,        // polygons per genome (fixed for the run)
    pub min_vertices: usize,
    pub max_vertices: usize,

    // alpha range (20-200 / 255)
    pub alpha_min: f32,
    pub alpha_max: f32,

    // mutation probabilities, one operator per mutate() call, remainder = replace polygon
    pub p_move_point: f32,
    pub p_recolor: f32,
    pub p_reorder: f32,
    pub p_translate: f32,

    // step sizes
    pub pos_step: f32,          // max vertex jitter (pixels)
    pub color_step: f32,        // max channel jitter (0..1 space)
    pub translate_max: f32,     // max whole-polygon shift (pixels)
    pub margin: f32,            // vertices may leave the canvas by this much (pixels)
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            polygons: 50,
            min_vertices: 3,
            max_vertices: 6,
            alpha_min: 20.0 / 255.0,
            alpha_max: 200.0 / 255.0,
            p_move_point: 0.35,
            p_recolor: 0.30,
            p_reorder: 0.10,
            p_translate: 0.15,
            // remainder: 10% = replace polygon
            pos_step: 15.0,
            color_step: 20.0 / 255.0,
            translate_max: 20.0,
            margin: 10.0,
        }
    }
}

impl ShapeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polygons == 0 {
            return Err(ConfigError::Invalid("polygons must be at least 1".into()));
        }
        if !(3..=8).contains(&self.min_vertices)
            || !(3..=8).contains(&self.max_vertices)
            || self.min_vertices > self.max_vertices
        {
            return Err(ConfigError::Invalid(format!(
                "vertex range {}..={} must lie within 3..=8",
                self.min_vertices, self.max_vertices
            )));
        }
        if !(0.0..=1.0).contains(&self.alpha_min)
            || !(0.0..=1.0).contains(&self.alpha_max)
            || self.alpha_min >= self.alpha_max
        {
            return Err(ConfigError::Invalid(format!(
                "alpha range {}..{} must be ordered within 0..=1",
                self.alpha_min, self.alpha_max
            )));
        }
        let probs = [self.p_move_point, self.p_recolor, self.p_reorder, self.p_translate];
        if probs.iter().any(|p| !(0.0..=1.0).contains(p)) || probs.iter().sum::<f32>() > 1.0 + 1e-6
        {
            return Err(ConfigError::Invalid(
                "mutation probabilities must lie in 0..=1 and sum to at most 1".into(),
            ));
        }
        if self.pos_step < 0.0
            || self.color_step < 0.0
            || self.translate_max < 0.0
            || self.margin < 0.0
        {
            return Err(ConfigError::Invalid("step sizes must be non-negative".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub evolve: EvolveConfig,
    pub shapes: ShapeConfig,
}

impl Settings {
    /// load settings from a JSON file. missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&json)?;
        Ok(settings)
    }

    /// save settings to a JSON file (pretty-printed)
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evolve.validate()?;
        self.shapes.validate()
    }
}
