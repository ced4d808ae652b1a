//! A write produces at most one sample, however large it is. Use one writer
//! per download attempt; it never resets.

use std::io::{self, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::store::DownloadStore;

pub const DEFAULT_SAMPLE_THRESHOLD: u64 = 256 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct ProgressWriter<W> {
    inner: W,
    store: Arc<DownloadStore>,
    item_id: Option<String>,
    threshold: u64,
    total: u64,
    last_sampled: u64,
    last_time: Instant,
    samples: u64,
}

impl<W> ProgressWriter<W> {
    pub(crate) fn new(
        inner: W,
        store: Arc<DownloadStore>,
        item_id: Option<String>,
        threshold: u64,
    ) -> Self {
        Self {
            inner,
            store,
            item_id,
            threshold,
            total: 0,
            last_sampled: 0,
            last_time: Instant::now(),
            samples: 0,
        }
    }

    /// Bytes forwarded to the sink so far.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Number of samples published so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn record(&mut self, written: usize) {
        self.total += written as u64;
        if self.total - self.last_sampled < self.threshold {
            return;
        }

        let mb_downloaded = self.total as f64 / BYTES_PER_MB;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_time).as_secs_f64();
        let bytes = (self.total - self.last_sampled) as f64;

        let mut speed_mbps = 0.0;
        if elapsed > 0.0 {
            speed_mbps = (bytes / BYTES_PER_MB) / elapsed;
            self.store.publish_speed(speed_mbps);
            debug!("Downloaded: {:.2} MB ({:.2} MB/s)", mb_downloaded, speed_mbps);
        } else {
            debug!("Downloaded: {:.2} MB", mb_downloaded);
        }

        self.store.publish_progress(mb_downloaded);
        if let Some(id) = &self.item_id {
            self.store.update_progress(id, mb_downloaded, speed_mbps);
        }

        self.last_sampled = self.total;
        self.last_time = now;
        self.samples += 1;
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.record(written);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                this.record(written);
                Poll::Ready(Ok(written))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
