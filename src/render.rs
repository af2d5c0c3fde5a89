use image::RgbaImage;
use tiny_skia as sk;
use std::sync::Arc;

use crate::dna::{Genome, Polygon};

pub struct CpuRenderer;

impl CpuRenderer {
    /// full-frame render onto an opaque white background.
    /// every output pixel is opaque, so tiny-skia's premultiplied bytes are also valid
    /// straight RGBA and the buffer can be handed out as a canonical raster without conversion.
    /// returns None only for a zero-area (or absurdly large) canvas.
    pub fn render(genome: &Genome) -> Option<RgbaImage> {
        profiling::scope!("render");
        let (w, h) = (genome.width, genome.height);
        let mut pix = sk::Pixmap::new(w, h)?;
        // White background (classic Evolve-style)
        pix.fill(sk::Color::WHITE);

        let mut paint = sk::Paint::default();
        paint.anti_alias = true;
        for poly in &genome.polys {
            draw_polygon(&mut pix, poly, &mut paint);
        }

        // take the pixmap's buffer, no copy
        RgbaImage::from_raw(w, h, pix.take())
    }
}

fn draw_polygon(pix: &mut sk::Pixmap, poly: &Polygon, paint: &mut sk::Paint<'_>) {
    profiling::scope!("draw_polygon");
    if poly.points.len() < 3 {
        return;
    }

    // Quick reject: bbox fully outside the pixmap
    let (w, h) = (pix.width() as f32, pix.height() as f32);
    let (min_x, min_y, max_x, max_y) = poly.bounds();
    if max_x < 0.0 || max_y < 0.0 || min_x >= w || min_y >= h {
        return; // fully off-screen: skip tiny-skia work
    }

    // path is built once per polygon value; clones start with an empty cache
    let path = poly.cached_path.get_or_init(|| {
        let mut pb = sk::PathBuilder::new();
        pb.move_to(poly.points[0].0, poly.points[0].1);
        for &(x, y) in &poly.points[1..] {
            pb.line_to(x, y);
        }
        pb.close();
        pb.finish().map(Arc::new)
    });
    let Some(path) = path else {
        return;
    };

    let [r, g, b, a] = poly.rgba;
    let Some(color) = sk::Color::from_rgba(
        r.clamp(0.0, 1.0),
        g.clamp(0.0, 1.0),
        b.clamp(0.0, 1.0),
        a.clamp(0.0, 1.0),
    ) else {
        return;
    };
    paint.set_color(color);

    pix.fill_path(path, paint, sk::FillRule::Winding, sk::Transform::identity(), None);
}
