//! in-place mutation operators for polygon genomes.
//! exactly one operator runs per call; all randomness comes from the caller's RNG.

use rand::Rng;
use std::sync::Arc;

use crate::dna::{sort_by_angle, Genome, Polygon};
use crate::settings::ShapeConfig;

/// which operator a mutate() call applied (useful for tests and debug logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    MovePoint,
    Recolor,
    Reorder,
    Translate,
    Replace,
}

/// pick an operator by the configured probabilities and apply it.
pub fn mutate_genome<R: Rng + ?Sized>(
    genome: &mut Genome,
    rng: &mut R,
    cfg: &ShapeConfig,
) -> MutationKind {
    profiling::scope!("mutate_genome");
    if genome.polys.is_empty() {
        // nothing to perturb, seed a polygon instead
        genome.polys.push(Arc::new(Polygon::random(rng, genome.width, genome.height, cfg)));
        return MutationKind::Replace;
    }

    let roll = rng.random::<f32>();
    let mut edge = cfg.p_move_point;
    if roll < edge {
        move_point(genome, rng, cfg);
        return MutationKind::MovePoint;
    }
    edge += cfg.p_recolor;
    if roll < edge {
        recolor_poly(genome, rng, cfg);
        return MutationKind::Recolor;
    }
    edge += cfg.p_reorder;
    if roll < edge && genome.polys.len() >= 2 {
        reorder_poly(genome, rng);
        return MutationKind::Reorder;
    }
    edge += cfg.p_translate;
    if roll < edge {
        translate_poly(genome, rng, cfg);
        return MutationKind::Translate;
    }
    replace_poly(genome, rng, cfg);
    MutationKind::Replace
}

/// jitter one vertex of a random polygon by up to ±pos_step on each axis
pub fn move_point<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R, cfg: &ShapeConfig) {
    profiling::scope!("move_point");
    let (w, h) = (genome.width as f32, genome.height as f32);
    let idx = rng.random_range(0..genome.polys.len());
    let poly = Arc::make_mut(&mut genome.polys[idx]);
    if poly.points.is_empty() {
        return;
    }
    let v = rng.random_range(0..poly.points.len());
    let (x, y) = poly.points[v];
    poly.points[v] = (
        (x + jitter(rng, cfg.pos_step)).clamp(-cfg.margin, w + cfg.margin),
        (y + jitter(rng, cfg.pos_step)).clamp(-cfg.margin, h + cfg.margin),
    );
    // keep the outline simple after the move
    sort_by_angle(&mut poly.points);
}

/// jitter one channel (r, g, b or alpha) of a random polygon by up to ±color_step
pub fn recolor_poly<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R, cfg: &ShapeConfig) {
    profiling::scope!("recolor_poly");
    let idx = rng.random_range(0..genome.polys.len());
    let poly = Arc::make_mut(&mut genome.polys[idx]);
    let ch = rng.random_range(0..4);
    let v = poly.rgba[ch] + jitter(rng, cfg.color_step);
    poly.rgba[ch] = if ch == 3 {
        v.clamp(cfg.alpha_min, cfg.alpha_max)
    } else {
        v.clamp(0.0, 1.0)
    };
}

/// move a random polygon to a random z index (matches Evolve's reorderPoly)
pub fn reorder_poly<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R) {
    profiling::scope!("reorder_poly");
    let n = genome.polys.len();
    if n < 2 {
        return;
    }
    let src = rng.random_range(0..n);
    let dst = rng.random_range(0..n);
    if src != dst {
        let poly = genome.polys.remove(src);
        genome.polys.insert(dst, poly);
    }
}

/// shift a whole polygon by up to ±translate_max, shape and color untouched
pub fn translate_poly<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R, cfg: &ShapeConfig) {
    profiling::scope!("translate_poly");
    let (w, h) = (genome.width as f32, genome.height as f32);
    let idx = rng.random_range(0..genome.polys.len());
    let dx = jitter(rng, cfg.translate_max);
    let dy = jitter(rng, cfg.translate_max);
    let poly = Arc::make_mut(&mut genome.polys[idx]);
    for p in &mut poly.points {
        p.0 = (p.0 + dx).clamp(-cfg.margin, w + cfg.margin);
        p.1 = (p.1 + dy).clamp(-cfg.margin, h + cfg.margin);
    }
}

/// swap a random polygon for a freshly generated one at the same z index
pub fn replace_poly<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R, cfg: &ShapeConfig) {
    profiling::scope!("replace_poly");
    let idx = rng.random_range(0..genome.polys.len());
    genome.polys[idx] = Arc::new(Polygon::random(rng, genome.width, genome.height, cfg));
}

#[inline]
fn jitter<R: Rng + ?Sized>(rng: &mut R, step: f32) -> f32 {
    if step <= 0.0 {
        return 0.0;
    }
    rng.random_range(-step..=step)
}
