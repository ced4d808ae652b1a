use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

#[derive(Debug, Default)]
pub struct Activity {
    active: AtomicI64,
    progress_mb: RwLock<f64>,
    speed_mbps: RwLock<f64>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the active count, clamping at zero. Reaching zero resets
    /// current progress and speed.
    pub fn decrement(&self) {
        let prev = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n > 0 { n - 1 } else { 0 })
            })
            // The closure never returns None.
            .unwrap_or_else(|n| n);

        if prev <= 1 {
            debug!("No downloads in flight, resetting live progress");
            self.set_progress(0.0);
            self.set_speed(0.0);
        }
    }

    pub fn active_count(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    pub fn set_progress(&self, mb: f64) {
        *self
            .progress_mb
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mb;
    }

    pub fn progress(&self) -> f64 {
        *self.progress_mb.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_speed(&self, mbps: f64) {
        *self
            .speed_mbps
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mbps;
    }

    pub fn speed(&self) -> f64 {
        *self.speed_mbps.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds one unit of the active count for as long as it lives.
#[must_use = "dropping the guard immediately ends the download"]
pub struct ActiveGuard<'a> {
    activity: &'a Activity,
}

impl<'a> ActiveGuard<'a> {
    pub(crate) fn new(activity: &'a Activity) -> Self {
        activity.increment();
        Self { activity }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.activity.decrement();
    }
}
