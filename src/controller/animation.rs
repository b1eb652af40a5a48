//! Fixed-rate interpolation between two frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Waits between animation ticks.
pub trait Pacer {
    fn wait(&mut self, period: Duration);
}

/// Sleeps the calling thread for real.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTime;

impl Pacer for RealTime {
    fn wait(&mut self, period: Duration) {
        thread::sleep(period);
    }
}

/// Advances a logical clock instead of sleeping.
///
/// Clones share the same clock, so a test can keep one and hand the other to
/// the controller.
#[derive(Debug, Default, Clone)]
pub struct NoDelay {
    elapsed_nanos: Arc<AtomicU64>,
    waits: Arc<AtomicU64>,
}

impl NoDelay {
    pub fn new() -> NoDelay {
        NoDelay::default()
    }

    /// Total time the animation would have slept.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }

    /// Number of waits requested.
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }
}

impl Pacer for NoDelay {
    fn wait(&mut self, period: Duration) {
        self.elapsed_nanos
            .fetch_add(period.as_nanos() as u64, Ordering::Relaxed);
        self.waits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Number of frames an animation of `seconds` takes at `fps`. Never less than one.
///
/// Partial frames are dropped, so 2.5 frames worth of time is 2 ticks.
pub fn ticks(seconds: f64, fps: f64) -> usize {
    let count = (seconds * fps) as i64;
    count.max(1) as usize
}

/// Time between two ticks. Fails unless `fps` is positive.
pub fn wait_time(fps: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(1.0 / fps).map_err(|_| Error::InvalidFrameRate(fps))
}

/// Frame `step` of `total` on the way from `first` to `last`.
///
/// Step 0 is `first` and step `total` is `last`, exactly. Both frames must
/// have the same length.
pub fn interpolate(first: &[f64], last: &[f64], total: usize, step: usize) -> Vec<f64> {
    if step == 0 {
        return first.to_vec();
    }
    if step >= total {
        return last.to_vec();
    }
    // Multiply before dividing so integral steps stay exact.
    let (step, total) = (step as f64, total as f64);
    first
        .iter()
        .zip(last)
        .map(|(from, to)| from + (to - from) * step / total)
        .collect()
}

/// Write `total` interpolated frames, waiting one period between them.
///
/// Stops at the first failed write.
pub(crate) fn run<W>(
    first: &[f64],
    last: &[f64],
    total: usize,
    period: Duration,
    pacer: &mut dyn Pacer,
    mut write: W,
) -> Result<()>
where
    W: FnMut(&[f64]) -> Result<()>,
{
    for step in 1..=total {
        write(&interpolate(first, last, total, step))?;
        if step < total {
            pacer.wait(period);
        }
    }
    Ok(())
}
