//! Each field group has its own lock and no operation holds two at once, so
//! readers can see one group updated before another.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::activity::{ActiveGuard, Activity};
use crate::queue::{DownloadItem, DownloadStatus, Queue, Transition};
use crate::sampler::{DEFAULT_SAMPLE_THRESHOLD, ProgressWriter};
use crate::session::Session;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub is_downloading: bool,
    pub mb_downloaded: f64,
    pub speed_mbps: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadQueueInfo {
    pub is_downloading: bool,
    pub queue: Vec<DownloadItem>,
    pub current_speed: f64,
    pub total_downloaded: f64,
    pub session_start_time: i64,
    pub queued_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
}

#[derive(Debug)]
pub struct DownloadStore {
    queue: Queue,
    activity: Activity,
    session: Session,
    current_item: Mutex<Option<String>>,
    sample_threshold: u64,
}

impl Default for DownloadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStore {
    pub fn new() -> Self {
        Self::with_sample_threshold(DEFAULT_SAMPLE_THRESHOLD)
    }

    pub fn with_sample_threshold(sample_threshold: u64) -> Self {
        Self {
            queue: Queue::new(),
            activity: Activity::new(),
            session: Session::new(),
            current_item: Mutex::new(None),
            sample_threshold: sample_threshold.max(1),
        }
    }

    // --- Active count ---

    pub fn increment_active(&self) {
        self.activity.increment();
    }

    pub fn decrement_active(&self) {
        self.activity.decrement();
    }

    /// Counts one download as in flight until the returned guard is dropped.
    pub fn begin_download(&self) -> ActiveGuard<'_> {
        ActiveGuard::new(&self.activity)
    }

    pub fn active_count(&self) -> i64 {
        self.activity.active_count()
    }

    pub fn progress(&self) -> ProgressInfo {
        ProgressInfo {
            is_downloading: self.activity.is_active(),
            mb_downloaded: self.activity.progress(),
            speed_mbps: self.activity.speed(),
        }
    }

    pub(crate) fn publish_speed(&self, mbps: f64) {
        self.activity.set_speed(mbps);
    }

    pub(crate) fn publish_progress(&self, mb: f64) {
        self.activity.set_progress(mb);
    }

    // --- Samplers ---

    /// Wraps `sink` in a sampler feeding only the live aggregates.
    pub fn progress_writer<W>(self: &Arc<Self>, sink: W) -> ProgressWriter<W> {
        ProgressWriter::new(sink, self.clone(), None, self.sample_threshold)
    }

    /// Wraps `sink` in a sampler that also updates the record `id`.
    pub fn item_writer<W>(self: &Arc<Self>, sink: W, id: impl Into<String>) -> ProgressWriter<W> {
        ProgressWriter::new(sink, self.clone(), Some(id.into()), self.sample_threshold)
    }

    // --- Queue ---

    pub fn enqueue(
        &self,
        id: &str,
        track_name: &str,
        artist_name: &str,
        album_name: &str,
        source_id: &str,
    ) {
        let item = DownloadItem::queued(id, track_name, artist_name, album_name, source_id);
        if !self.queue.push(item) {
            warn!("Ignoring duplicate enqueue for {}", id);
            return;
        }
        info!("Queued {} ({} - {})", id, artist_name, track_name);

        if self.session.open_if_closed(epoch_secs()) {
            debug!("Download session opened");
        }
    }

    pub fn start(&self, id: &str) {
        match self.queue.start(id, epoch_secs()) {
            Transition::Applied => {
                *self
                    .current_item
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
                info!("Started {}", id);
            }
            other => log_skipped("start", id, other),
        }
    }

    pub fn update_progress(&self, id: &str, progress: f64, speed: f64) {
        if let t @ Transition::Ignored(_) = self.queue.update_progress(id, progress, speed) {
            log_skipped("update_progress", id, t);
        }
    }

    pub fn complete(&self, id: &str, file_path: &str, final_size: f64) {
        let transition = self
            .queue
            .finish(id, DownloadStatus::Completed, epoch_secs(), |item| {
                item.file_path = file_path.to_string();
                item.progress = final_size;
                item.total_size = final_size;
            });

        match transition {
            Transition::Applied => {
                self.session.add_completed(final_size);
                info!("Completed {} ({:.2} MB) -> {}", id, final_size, file_path);
            }
            other => log_skipped("complete", id, other),
        }
    }

    pub fn fail(&self, id: &str, error_message: &str) {
        let transition = self
            .queue
            .finish(id, DownloadStatus::Failed, epoch_secs(), |item| {
                item.error_message = error_message.to_string();
            });

        match transition {
            Transition::Applied => info!("Failed {}: {}", id, error_message),
            other => log_skipped("fail", id, other),
        }
    }

    pub fn skip(&self, id: &str, file_path: &str) {
        let transition = self
            .queue
            .finish(id, DownloadStatus::Skipped, epoch_secs(), |item| {
                item.file_path = file_path.to_string();
            });

        match transition {
            Transition::Applied => info!("Skipped {} (exists at {})", id, file_path),
            other => log_skipped("skip", id, other),
        }
    }

    /// Cancels queued records. Records already downloading are left alone;
    /// their workers finish or fail them as usual.
    pub fn cancel_all_queued(&self) {
        let cancelled = self.queue.cancel_queued(epoch_secs());
        info!("Cancelled {} queued downloads", cancelled);
    }

    pub fn current_item_id(&self) -> Option<String> {
        self.current_item
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<DownloadItem> {
        self.queue.get(id)
    }

    /// Returns a copy of the queue with counts and aggregates. Closes the
    /// session first if nothing is queued or downloading.
    pub fn snapshot(&self) -> DownloadQueueInfo {
        self.reset_session_if_complete();

        let (queue, counts) = self.queue.snapshot();
        DownloadQueueInfo {
            is_downloading: self.activity.is_active(),
            queue,
            current_speed: self.activity.speed(),
            total_downloaded: self.session.total_downloaded(),
            session_start_time: self.session.start_time(),
            queued_count: counts.queued,
            completed_count: counts.completed,
            failed_count: counts.failed,
            skipped_count: counts.skipped,
        }
    }

    /// Removes completed, failed and skipped records.
    pub fn clear_terminal(&self) {
        let removed = self.queue.retain_pending();
        info!("Cleared {} finished downloads", removed);
    }

    pub fn clear_all(&self) {
        self.queue.clear();
        self.session.reset();
        *self
            .current_item
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.activity.set_progress(0.0);
        self.activity.set_speed(0.0);
        info!("Cleared download queue");
    }

    fn reset_session_if_complete(&self) {
        if !self.queue.has_pending() {
            debug!("No pending downloads, closing session");
            self.session.reset();
        }
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn log_skipped(op: &str, id: &str, transition: Transition) {
    match transition {
        Transition::Applied => {}
        Transition::Ignored(status) => {
            debug!("{} ignored for {}: already {:?}", op, id, status)
        }
        Transition::NotFound => debug!("{} ignored: no download {}", op, id),
    }
}
