//! Records are found by linear scan; queues stay small.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Skipped,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn is_pending(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub source_id: String,
    pub status: DownloadStatus,
    /// MB downloaded so far, or the final size once completed.
    pub progress: f64,
    pub total_size: f64,
    /// MB per second.
    pub speed: f64,
    /// Epoch seconds, 0 when unset.
    pub start_time: i64,
    pub end_time: i64,
    pub error_message: String,
    pub file_path: String,
}

impl DownloadItem {
    pub fn queued(
        id: impl Into<String>,
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        album_name: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: album_name.into(),
            source_id: source_id.into(),
            status: DownloadStatus::Queued,
            progress: 0.0,
            total_size: 0.0,
            speed: 0.0,
            start_time: 0,
            end_time: 0,
            error_message: String::new(),
            file_path: String::new(),
        }
    }
}

/// Outcome of a status change request against the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The record exists but was already in the given status, from which the
    /// requested move is not allowed.
    Ignored(DownloadStatus),
    NotFound,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a DownloadItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.status {
                DownloadStatus::Queued => counts.queued += 1,
                DownloadStatus::Downloading => counts.downloading += 1,
                DownloadStatus::Completed => counts.completed += 1,
                DownloadStatus::Failed => counts.failed += 1,
                DownloadStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Default)]
pub struct Queue {
    items: RwLock<Vec<DownloadItem>>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the item. Returns false, leaving the queue untouched, when a
    /// record with the same id already exists.
    pub fn push(&self, item: DownloadItem) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.iter().any(|existing| existing.id == item.id) {
            return false;
        }
        items.push(item);
        true
    }

    pub fn start(&self, id: &str, now: i64) -> Transition {
        self.with_item(id, |item| {
            if item.status != DownloadStatus::Queued {
                return Transition::Ignored(item.status);
            }
            item.status = DownloadStatus::Downloading;
            item.start_time = now;
            item.progress = 0.0;
            Transition::Applied
        })
    }

    /// Overwrites progress and speed on a record that has not finished yet.
    pub fn update_progress(&self, id: &str, progress: f64, speed: f64) -> Transition {
        self.with_item(id, |item| {
            if item.status.is_terminal() {
                return Transition::Ignored(item.status);
            }
            item.progress = progress;
            item.speed = speed;
            Transition::Applied
        })
    }

    /// Moves a pending record into `status`, stamping the end time and then
    /// applying `fill` for the status-specific fields.
    pub fn finish(
        &self,
        id: &str,
        status: DownloadStatus,
        now: i64,
        fill: impl FnOnce(&mut DownloadItem),
    ) -> Transition {
        debug_assert!(status.is_terminal());
        self.with_item(id, |item| {
            if item.status.is_terminal() {
                return Transition::Ignored(item.status);
            }
            item.status = status;
            item.end_time = now;
            fill(item);
            Transition::Applied
        })
    }

    /// Marks every queued record as skipped with a "Cancelled" message.
    /// Returns how many records were cancelled.
    pub fn cancel_queued(&self, now: i64) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let mut cancelled = 0;
        for item in items
            .iter_mut()
            .filter(|item| item.status == DownloadStatus::Queued)
        {
            item.status = DownloadStatus::Skipped;
            item.end_time = now;
            item.error_message = "Cancelled".to_string();
            cancelled += 1;
        }
        cancelled
    }

    /// Drops every finished record, keeping pending ones in order. Returns
    /// how many were removed.
    pub fn retain_pending(&self) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|item| item.status.is_pending());
        before - items.len()
    }

    pub fn clear(&self) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn has_pending(&self) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|item| item.status.is_pending())
    }

    /// Copies the queue and counts its statuses under a single read lock.
    pub fn snapshot(&self) -> (Vec<DownloadItem>, StatusCounts) {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        (items.clone(), StatusCounts::tally(items.iter()))
    }

    pub fn get(&self, id: &str) -> Option<DownloadItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    fn with_item(
        &self,
        id: &str,
        f: impl FnOnce(&mut DownloadItem) -> Transition,
    ) -> Transition {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => f(item),
            None => Transition::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> DownloadItem {
        DownloadItem::queued(id, "Song", "Artist", "Album", "sid")
    }

    #[test]
    fn test_push_rejects_duplicate_id() {
        let queue = Queue::new();
        assert!(queue.push(item("a")));
        assert!(!queue.push(item("a")));
        assert_eq!(queue.snapshot().0.len(), 1);
    }

    #[test]
    fn test_start_only_from_queued() {
        let queue = Queue::new();
        queue.push(item("a"));
        assert_eq!(queue.start("a", 10), Transition::Applied);
        assert_eq!(
            queue.start("a", 20),
            Transition::Ignored(DownloadStatus::Downloading)
        );
        assert_eq!(queue.get("a").unwrap().start_time, 10);
        assert_eq!(queue.start("missing", 10), Transition::NotFound);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let queue = Queue::new();
        queue.push(item("a"));
        queue.start("a", 1);
        let applied = queue.finish("a", DownloadStatus::Failed, 2, |item| {
            item.error_message = "timeout".to_string();
        });
        assert_eq!(applied, Transition::Applied);

        let again = queue.finish("a", DownloadStatus::Completed, 3, |item| {
            item.file_path = "/x".to_string();
        });
        assert_eq!(again, Transition::Ignored(DownloadStatus::Failed));
        assert_eq!(queue.start("a", 4), Transition::Ignored(DownloadStatus::Failed));

        let record = queue.get("a").unwrap();
        assert_eq!(record.status, DownloadStatus::Failed);
        assert_eq!(record.end_time, 2);
        assert!(record.file_path.is_empty());
    }

    #[test]
    fn test_progress_ignored_after_finish() {
        let queue = Queue::new();
        queue.push(item("a"));
        queue.start("a", 1);
        assert_eq!(queue.update_progress("a", 1.0, 0.5), Transition::Applied);
        queue.finish("a", DownloadStatus::Completed, 2, |item| {
            item.progress = 3.0;
        });
        assert_eq!(
            queue.update_progress("a", 2.0, 0.5),
            Transition::Ignored(DownloadStatus::Completed)
        );
        assert_eq!(queue.get("a").unwrap().progress, 3.0);
    }

    #[test]
    fn test_retain_pending_keeps_order() {
        let queue = Queue::new();
        for id in ["a", "b", "c", "d", "e"] {
            queue.push(item(id));
        }
        queue.start("b", 1);
        queue.finish("a", DownloadStatus::Completed, 2, |_| {});
        queue.finish("c", DownloadStatus::Skipped, 2, |_| {});
        queue.start("d", 1);
        queue.finish("d", DownloadStatus::Failed, 3, |_| {});

        assert_eq!(queue.retain_pending(), 3);
        let (items, _) = queue.snapshot();
        let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["b", "e"]);
    }

    #[test]
    fn test_snapshot_counts_match_copy() {
        let queue = Queue::new();
        for id in ["a", "b", "c"] {
            queue.push(item(id));
        }
        queue.start("a", 1);
        queue.finish("b", DownloadStatus::Skipped, 1, |_| {});

        let (items, counts) = queue.snapshot();
        assert_eq!(counts, StatusCounts::tally(items.iter()));
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.downloading, 1);
        assert_eq!(counts.skipped, 1);
    }
}
