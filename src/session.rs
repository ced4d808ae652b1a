use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Session {
    total_downloaded: Mutex<f64>,
    /// Epoch seconds, 0 when no session is open.
    start_time: Mutex<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start time unless a session is already open. Returns whether
    /// a new session was opened.
    pub fn open_if_closed(&self, now: i64) -> bool {
        let mut start = self
            .start_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *start == 0 {
            *start = now;
            true
        } else {
            false
        }
    }

    pub fn add_completed(&self, size_mb: f64) {
        *self
            .total_downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += size_mb;
    }

    pub fn total_downloaded(&self) -> f64 {
        *self
            .total_downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_time(&self) -> i64 {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        *self
            .total_downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_time_set_once() {
        let session = Session::new();
        assert_eq!(session.start_time(), 0);
        assert!(session.open_if_closed(100));
        assert!(!session.open_if_closed(200));
        assert_eq!(session.start_time(), 100);
    }

    #[test]
    fn test_totals_accumulate_until_reset() {
        let session = Session::new();
        session.open_if_closed(1);
        session.add_completed(3.0);
        session.add_completed(1.5);
        assert_eq!(session.total_downloaded(), 4.5);

        session.reset();
        assert_eq!(session.total_downloaded(), 0.0);
        assert_eq!(session.start_time(), 0);
        assert!(session.open_if_closed(50));
    }
}
