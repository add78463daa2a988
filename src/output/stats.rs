//! Run statistics
//!
//! `RunStats` collects the counters and timers of a crawl run. Every worker
//! owns a private instance and the coordinator folds it into the run total
//! with `merge` once the worker finishes, so workers never contend on the
//! same counters while they run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Event counters tracked during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    ProcessedThreads,
    AddedPosts,
    RemovedPosts,
    DownloadedImages,
    DownloadedThumbnails,
    DownloadedThreads,
}

impl Counter {
    const ALL: [Counter; 6] = [
        Counter::ProcessedThreads,
        Counter::AddedPosts,
        Counter::RemovedPosts,
        Counter::DownloadedImages,
        Counter::DownloadedThumbnails,
        Counter::DownloadedThreads,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated durations tracked during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Time spent transferring data from the remote service
    Download,
    /// Time spent sleeping in the rate gate
    Wait,
    /// Time spent in the rate gate including queueing for its lock
    WaitWithLock,
}

impl Timer {
    const ALL: [Timer; 3] = [Timer::Download, Timer::Wait, Timer::WaitWithLock];

    fn index(self) -> usize {
        self as usize
    }
}

/// Thread-safe counters and timers of a crawl run
#[derive(Debug, Default)]
pub struct RunStats {
    counters: [AtomicU64; 6],
    // nanoseconds
    timers: [AtomicU64; 3],
}

/// Plain snapshot of `RunStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub download_time: Duration,
    pub wait_time: Duration,
    pub wait_time_with_lock: Duration,
    pub processed_threads: u64,
    pub added_posts: u64,
    pub removed_posts: u64,
    pub downloaded_images: u64,
    pub downloaded_thumbnails: u64,
    pub downloaded_threads: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to a counter
    pub fn add(&self, counter: Counter, value: u64) {
        self.counters[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    /// Adds one to a counter
    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Adds a duration to a timer
    pub fn add_time(&self, timer: Timer, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.timers[timer.index()].fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn time(&self, timer: Timer) -> Duration {
        Duration::from_nanos(self.timers[timer.index()].load(Ordering::Relaxed))
    }

    /// Adds every counter and timer of `other` into `self`
    pub fn merge(&self, other: &RunStats) {
        for counter in Counter::ALL {
            self.add(counter, other.get(counter));
        }
        for timer in Timer::ALL {
            self.add_time(timer, other.time(timer));
        }
    }

    /// Takes a snapshot of the current values
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            download_time: self.time(Timer::Download),
            wait_time: self.time(Timer::Wait),
            wait_time_with_lock: self.time(Timer::WaitWithLock),
            processed_threads: self.get(Counter::ProcessedThreads),
            added_posts: self.get(Counter::AddedPosts),
            removed_posts: self.get(Counter::RemovedPosts),
            downloaded_images: self.get(Counter::DownloadedImages),
            downloaded_thumbnails: self.get(Counter::DownloadedThumbnails),
            downloaded_threads: self.get(Counter::DownloadedThreads),
        }
    }

    /// Renders a one-line human readable summary of the run
    ///
    /// Waiting and downloading shares are divided by the worker count to
    /// approximate the share of each worker's wall time.
    pub fn report(&self, total_elapsed: Duration, workers: usize) -> String {
        let wait_percent = share_percent(self.time(Timer::WaitWithLock), total_elapsed, workers);
        let download_percent = share_percent(self.time(Timer::Download), total_elapsed, workers);

        format!(
            "Time passed: {:.2} seconds ({}% waiting, {}% downloading files) \
             Processed threads: {} Added posts: {} Removed posts: {} \
             Downloaded images: {} Downloaded thumbnails: {} Downloaded threads: {}",
            total_elapsed.as_secs_f64(),
            wait_percent,
            download_percent,
            self.get(Counter::ProcessedThreads),
            self.get(Counter::AddedPosts),
            self.get(Counter::RemovedPosts),
            self.get(Counter::DownloadedImages),
            self.get(Counter::DownloadedThumbnails),
            self.get(Counter::DownloadedThreads),
        )
    }
}

/// `part / total * 100 / workers`, rounded; 0 when the ratio is undefined
fn share_percent(part: Duration, total: Duration, workers: usize) -> u64 {
    let total = total.as_secs_f64();
    if total <= 0.0 || workers == 0 {
        return 0;
    }
    (part.as_secs_f64() / total * 100.0 / workers as f64).round() as u64
}

/// Divides a duration between workers, returning seconds
pub fn per_worker_seconds(duration: Duration, workers: usize) -> f64 {
    if workers == 0 {
        return 0.0;
    }
    duration.as_secs_f64() / workers as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(added: u64, removed: u64, download_ms: u64) -> RunStats {
        let stats = RunStats::new();
        stats.add(Counter::AddedPosts, added);
        stats.add(Counter::RemovedPosts, removed);
        stats.add_time(Timer::Download, Duration::from_millis(download_ms));
        stats
    }

    #[test]
    fn test_merge_adds_counters() {
        let total = stats_with(3, 0, 0);
        total.merge(&stats_with(5, 0, 0));
        assert_eq!(total.get(Counter::AddedPosts), 8);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = stats_with(3, 1, 200);
        a.merge(&stats_with(5, 2, 300));

        let b = stats_with(5, 2, 300);
        b.merge(&stats_with(3, 1, 200));

        assert_eq!(a.totals(), b.totals());
    }

    #[test]
    fn test_merge_is_associative() {
        // (x + y) + z
        let left = stats_with(1, 2, 10);
        left.merge(&stats_with(4, 8, 20));
        left.merge(&stats_with(16, 32, 40));

        // x + (y + z)
        let yz = stats_with(4, 8, 20);
        yz.merge(&stats_with(16, 32, 40));
        let right = stats_with(1, 2, 10);
        right.merge(&yz);

        assert_eq!(left.totals(), right.totals());
        assert_eq!(left.get(Counter::AddedPosts), 21);
        assert_eq!(left.time(Timer::Download), Duration::from_millis(70));
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = std::sync::Arc::new(RunStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.incr(Counter::DownloadedThreads);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.get(Counter::DownloadedThreads), 8000);
    }

    #[test]
    fn test_report_percentages() {
        let stats = RunStats::new();
        stats.add_time(Timer::WaitWithLock, Duration::from_secs(20));
        stats.add_time(Timer::Download, Duration::from_secs(5));
        stats.add(Counter::ProcessedThreads, 7);

        let text = stats.report(Duration::from_secs(10), 2);
        assert!(text.starts_with("Time passed: 10.00 seconds (100% waiting, 25% downloading files)"));
        assert!(text.contains("Processed threads: 7"));
    }

    #[test]
    fn test_report_with_zero_elapsed() {
        let stats = stats_with(1, 1, 500);
        let text = stats.report(Duration::ZERO, 4);
        assert!(text.contains("(0% waiting, 0% downloading files)"));
    }

    #[test]
    fn test_per_worker_seconds() {
        assert_eq!(per_worker_seconds(Duration::from_secs(10), 4), 2.5);
        assert_eq!(per_worker_seconds(Duration::from_secs(10), 0), 0.0);
    }
}
