//─────────────────────────────────────────────────────────────────────────────
// resolution-invariant metrics (SAD/px, PSNR) for progress lines
//─────────────────────────────────────────────────────────────────────────────

/// SAD includes alpha, so the pseudo-MSE divides by all 4 channels
pub const FITNESS_CHANNELS_F64: f64 = 4.0;

/// peak value for 8-bit rasters
pub const PSNR_PEAK_8BIT: f64 = 255.0;

/// PSNR (peak signal-to-noise ratio) in decibels. higher = better.
/// typical ranges: 30 dB acceptable, 35 dB good, 40+ dB very good.
#[inline]
pub fn psnr_from_mse(mse: f64, peak: f64) -> f64 {
    let mse = mse.max(1e-12);
    10.0 * ((peak * peak) / mse).log10()
}

/// snapshot of resolution-invariant metrics computed from a raw SAD and the pixel count.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub sad_per_px: f64,
    pub psnr: f64,
}

impl MetricsSnapshot {
    /// "pseudo-MSE from SAD" convention: L1 per pixel per channel treated as if it were MSE.
    #[inline]
    pub fn from_sad(sad: u64, num_pixels: usize) -> Self {
        let n = (num_pixels as f64).max(1.0);
        let sad = sad as f64;
        let sad_per_px = sad / n;
        let pseudo_mse = (sad / (n * FITNESS_CHANNELS_F64)).max(1e-12);
        let psnr = psnr_from_mse(pseudo_mse, PSNR_PEAK_8BIT);
        Self { sad_per_px, psnr }
    }
}
