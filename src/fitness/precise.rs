/// reference distance: sqrt of the summed squared differences of 16-bit premultiplied channels.
/// an order of magnitude slower than SAD, kept as the correctness yardstick.
use image::{GenericImageView, Rgba};

use crate::raster::{check_bounds, RasterError};

/// works on any view yielding 8-bit RGBA pixels (`RgbaImage`, `DynamicImage`, sub-images).
pub fn precise_distance<A, B>(a: &A, b: &B) -> Result<u64, RasterError>
where
    A: GenericImageView<Pixel = Rgba<u8>> + ?Sized,
    B: GenericImageView<Pixel = Rgba<u8>> + ?Sized,
{
    profiling::scope!("precise_distance");
    check_bounds(a, b)?;

    let (w, h) = a.dimensions();
    let mut accum = 0u64;

    for y in 0..h {
        for x in 0..w {
            let p = premul16(a.get_pixel(x, y));
            let q = premul16(b.get_pixel(x, y));

            // four shifted squares fit a u32, alpha included
            let sum = sq_diff(p[0], q[0])
                + sq_diff(p[1], q[1])
                + sq_diff(p[2], q[2])
                + sq_diff(p[3], q[3]);
            accum += u64::from(sum);
        }
    }

    Ok(accum.isqrt())
}

/// widen straight 8-bit RGBA to premultiplied 16-bit ([0, 0xffff] per channel)
#[inline]
fn premul16(px: Rgba<u8>) -> [u32; 4] {
    let [r, g, b, a] = px.0;
    let a16 = u32::from(a) * 0x101;
    let ch = |c: u8| u32::from(c) * 0x101 * a16 / 0xffff;
    [ch(r), ch(g), ch(b), a16]
}

/// squared difference shifted right by 2 so that adding four of them can't overflow a u32.
/// x and y must be in [0, 0xffff].
#[inline]
fn sq_diff(x: u32, y: u32) -> u32 {
    let d = x.abs_diff(y);
    (d * d) >> 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::fast_distance;
    use image::{DynamicImage, RgbaImage};
    use proptest::prelude::*;

    #[test]
    fn single_pixel_scenario() {
        let a = RgbaImage::from_raw(1, 1, vec![10, 20, 30, 255]).unwrap();
        let b = RgbaImage::from_raw(1, 1, vec![12, 20, 25, 255]).unwrap();
        // (514^2 >> 2) + (1285^2 >> 2) = 478855, isqrt = 691
        assert_eq!(precise_distance(&a, &b).unwrap(), 691);
    }

    #[test]
    fn transparent_colors_collapse() {
        // fully transparent pixels premultiply to zero regardless of rgb
        let a = RgbaImage::from_raw(1, 1, vec![255, 0, 0, 0]).unwrap();
        let b = RgbaImage::from_raw(1, 1, vec![0, 255, 0, 0]).unwrap();
        assert_eq!(precise_distance(&a, &b).unwrap(), 0);
        assert!(fast_distance(&a, &b).unwrap() > 0);
    }

    #[test]
    fn extreme_channels_do_not_overflow() {
        let black = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 0]));
        let white = RgbaImage::from_pixel(32, 32, Rgba([255, 255, 255, 255]));
        let per_px = u64::from(sq_diff(0, 0xffff)) * 4;
        assert_eq!(precise_distance(&black, &white).unwrap(), (per_px * 32 * 32).isqrt());
    }

    #[test]
    fn mismatched_bounds_is_an_error() {
        let a = RgbaImage::new(3, 3);
        let b = RgbaImage::new(2, 3);
        assert_eq!(
            precise_distance(&a, &b),
            Err(RasterError::BoundsMismatch { left: (3, 3), right: (2, 3) })
        );
    }

    #[test]
    fn accepts_dynamic_images() {
        let a = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));
        let b = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        assert_eq!(precise_distance(&a, &b).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn zero_exactly_when_fast_is_zero_for_opaque(
            px in proptest::collection::vec(any::<[u8; 3]>(), 9),
        ) {
            let a = RgbaImage::from_fn(3, 3, |x, y| {
                let [r, g, b] = px[(y * 3 + x) as usize];
                Rgba([r, g, b, 255])
            });
            prop_assert_eq!(precise_distance(&a, &a).unwrap(), 0);
            prop_assert_eq!(fast_distance(&a, &a).unwrap(), 0);
        }

        #[test]
        fn symmetric(p in any::<[u8; 4]>(), q in any::<[u8; 4]>()) {
            let a = RgbaImage::from_pixel(2, 1, Rgba(p));
            let b = RgbaImage::from_pixel(2, 1, Rgba(q));
            prop_assert_eq!(precise_distance(&a, &b).unwrap(), precise_distance(&b, &a).unwrap());
        }
    }
}
