//! live preview sinks. the loop pushes ranked rasters here every generation;
//! sinks never feed anything back and never fail the run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use image::RgbaImage;

pub trait LiveSink: Send + Sync {
    /// accept a snapshot. best-effort: errors are logged, not returned.
    fn update(&self, raster: &RgbaImage);
}

/// latest frame behind a mutex, readable from any thread (e.g. a preview server)
#[derive(Debug, Default)]
pub struct SharedFrame {
    frame: Mutex<Option<Arc<RgbaImage>>>,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Arc<RgbaImage>> {
        match self.frame.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LiveSink for SharedFrame {
    fn update(&self, raster: &RgbaImage) {
        let frame = Arc::new(raster.clone());
        match self.frame.lock() {
            Ok(mut guard) => *guard = Some(frame),
            Err(poisoned) => *poisoned.into_inner() = Some(frame),
        }
    }
}

/// forwards frames over a channel (wrap in Arc to avoid a second copy on the receiver side)
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Arc<RgbaImage>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Arc<RgbaImage>>) -> Self {
        Self { tx }
    }
}

impl LiveSink for ChannelSink {
    fn update(&self, raster: &RgbaImage) {
        // receiver gone = nobody is watching, not an error
        let _ = self.tx.send(Arc::new(raster.clone()));
    }
}

/// writes every `every`-th frame to `<dir>/<prefix>-<seq>.png`
#[derive(Debug)]
pub struct PngSnapshotSink {
    dir: PathBuf,
    prefix: String,
    every: u64,
    seen: AtomicU64,
}

impl PngSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            every: every.max(1),
            seen: AtomicU64::new(0),
        }
    }

    pub fn path_for(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{}-{:06}.png", self.prefix, seq))
    }
}

impl LiveSink for PngSnapshotSink {
    fn update(&self, raster: &RgbaImage) {
        profiling::scope!("PngSnapshotSink::update");
        let seq = self.seen.fetch_add(1, Ordering::Relaxed);
        if seq % self.every != 0 {
            return;
        }
        let path = self.path_for(seq);
        if let Err(e) = raster.save(&path) {
            log::warn!("failed to write preview {}: {}", path.display(), e);
        }
    }
}
