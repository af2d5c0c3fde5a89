/// Sum of Absolute Differences (SAD) / Manhattan distance on RGBA (all 4 channels).
/// works directly on the flat canonical byte buffer, no per-pixel color decoding.
use image::RgbaImage;
use rayon::prelude::*;

use crate::raster::{check_bounds, RasterError, CHANNELS};

// minimum chunk: 256 KB per rayon task, smaller buffers are summed on the calling thread
const MIN_CHUNK_BYTES: usize = 256 * 1024;

/// byte-wise SAD between two canonical rasters of identical bounds.
/// no square root is applied, the raw sum is the distance.
pub fn fast_distance(a: &RgbaImage, b: &RgbaImage) -> Result<u64, RasterError> {
    profiling::scope!("fast_distance");
    check_bounds(a, b)?;

    // the container may be longer than the pixel rectangle, only score the rectangle
    let (w, h) = a.dimensions();
    let len = w as usize * h as usize * CHANNELS;
    Ok(sad_bytes(&a.as_raw()[..len], &b.as_raw()[..len]))
}

/// SAD over two equally long byte slices, chunked across rayon for large buffers.
/// result is identical to the serial sum (u64 addition is associative).
#[inline]
pub fn sad_bytes(a: &[u8], b: &[u8]) -> u64 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < 2 * MIN_CHUNK_BYTES {
        return sad_serial(a, b);
    }

    let num_cores = rayon::current_num_threads().max(1);
    let chunk_size = (a.len() / num_cores).max(MIN_CHUNK_BYTES);

    a.par_chunks(chunk_size)
        .zip(b.par_chunks(chunk_size))
        .map(|(x, y)| sad_serial(x, y))
        .sum()
}

// tight zip loop, auto-vectorizes to psadbw-style code in release builds
#[inline]
fn sad_serial(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum()
}
