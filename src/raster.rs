//! canonical raster layout and the normalizer that produces it.
//!
//! canonical = 8 bits per channel, R,G,B,A interleaved, row-major, top-left origin,
//! which is exactly `image::RgbaImage`. every comparator and every candidate render
//! works on this layout.

use std::borrow::Cow;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageError, RgbaImage};

/// bytes per canonical pixel
pub const CHANNELS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    #[error("raster bounds not equal: {}x{} vs {}x{}", .left.0, .left.1, .right.0, .right.1)]
    BoundsMismatch { left: (u32, u32), right: (u32, u32) },
    #[error("raster has zero area ({0}x{1})")]
    Empty(u32, u32),
}

/// fail with `BoundsMismatch` unless both views cover the same pixel rectangle.
#[inline]
pub fn check_bounds<A, B>(a: &A, b: &B) -> Result<(), RasterError>
where
    A: GenericImageView + ?Sized,
    B: GenericImageView + ?Sized,
{
    let (left, right) = (a.dimensions(), b.dimensions());
    if left != right {
        return Err(RasterError::BoundsMismatch { left, right });
    }
    Ok(())
}

/// decode a reference image from disk (any format the `image` crate knows).
pub fn load_reference(path: &Path) -> Result<DynamicImage, ImageError> {
    profiling::scope!("load_reference");
    image::open(path)
}

/// borrow the canonical buffer if the image already is one, otherwise convert.
/// never mutates the input.
pub fn normalize(img: &DynamicImage) -> Result<Cow<'_, RgbaImage>, RasterError> {
    profiling::scope!("normalize");
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(RasterError::Empty(w, h));
    }

    match img {
        DynamicImage::ImageRgba8(buf) => Ok(Cow::Borrowed(buf)),
        other => Ok(Cow::Owned(other.to_rgba8())),
    }
}
