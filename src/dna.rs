use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::settings::ShapeConfig;

/// a polygon with 3-8 points and color stored as un-premultiplied. also caches a T-S path
#[derive(Debug, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<(f32, f32)>,  // vertex coordinates in pixels
    pub rgba: [f32; 4],            // un-premultiplied, 0..1

    #[serde(skip)]
    pub cached_path: OnceLock<Option<Arc<tiny_skia::Path>>>, // None = degenerate outline
}

// this way stale paths won't be copied if the polygon is cloned.
impl Clone for Polygon {
    fn clone(&self) -> Self {
        Self {
            points: self.points.clone(),
            rgba: self.rgba,
            cached_path: OnceLock::new(),
        }
    }
}

impl Polygon {
    /// random polygon anywhere on a width x height canvas.
    /// vertices are ordered by angle around their centroid so the outline never self-intersects.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        width: u32,
        height: u32,
        cfg: &ShapeConfig,
    ) -> Self {
        profiling::scope!("Polygon::random");
        let w = width as f32;
        let h = height as f32;
        let n = rng.random_range(cfg.min_vertices..=cfg.max_vertices);

        // cluster vertices around a random center so most polygons stay local
        let cx = rng.random::<f32>() * w;
        let cy = rng.random::<f32>() * h;
        let radius = (w.max(h) * 0.25).max(1.0);

        let mut points: Vec<(f32, f32)> = (0..n)
            .map(|_| {
                let x =
                    (cx + rng.random_range(-radius..=radius)).clamp(-cfg.margin, w + cfg.margin);
                let y =
                    (cy + rng.random_range(-radius..=radius)).clamp(-cfg.margin, h + cfg.margin);
                (x, y)
            })
            .collect();
        sort_by_angle(&mut points);

        let rgba = [
            rng.random::<f32>(),
            rng.random::<f32>(),
            rng.random::<f32>(),
            rng.random_range(cfg.alpha_min..=cfg.alpha_max),
        ];

        Polygon { points, rgba, cached_path: OnceLock::new() }
    }

    /// axis-aligned bbox (x_min, y_min, x_max, y_max), unclamped
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

/// sort points by angle around their centroid (turns any point set into a simple polygon)
pub fn sort_by_angle(points: &mut [(f32, f32)]) {
    if points.is_empty() {
        return;
    }
    let n = points.len() as f32;
    let cx = points.iter().map(|p| p.0).sum::<f32>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f32>() / n;
    points.sort_by(|a, b| {
        let angle_a = (a.1 - cy).atan2(a.0 - cx);
        let angle_b = (b.1 - cy).atan2(b.0 - cx);
        angle_a.total_cmp(&angle_b)
    });
}

// arc wrapper enables copy-on-write: cloning genome only copies pointers (8 bytes/each),
// not entire polygons. mutations use Arc::make_mut() to clone only modified polygons.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genome {
    pub width: u32,
    pub height: u32,

    #[serde(with = "arc_vec_serde")]
    pub polys: Vec<Arc<Polygon>>,
}

impl Genome {
    /// genome with `cfg.polygons` random polygons
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        width: u32,
        height: u32,
        cfg: &ShapeConfig,
    ) -> Self {
        profiling::scope!("Genome::random");
        let polys = (0..cfg.polygons)
            .map(|_| Arc::new(Polygon::random(rng, width, height, cfg)))
            .collect();
        Self { width, height, polys }
    }
}

// serde helper module for serializing/deserializing Vec<Arc<T>>.
// we serialize the inner value directly
mod arc_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::sync::Arc;

    pub fn serialize<S, T>(vec: &[Arc<T>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(vec.iter().map(|item| &**item))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<Arc<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().map(Arc::new).collect())
    }
}
