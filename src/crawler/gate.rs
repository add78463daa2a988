//! Request spacing shared by all workers of a run
//!
//! Requests are split into two classes, each with its own minimum interval
//! between consecutive releases. Workers queue on a per-class async mutex,
//! so releases within a class are strictly serialized while the two classes
//! never wait on each other.

use crate::config::ScraperConfig;
use crate::output::{RunStats, Timer};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Kind of remote request, each spaced independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Catalog and thread JSON
    Api,
    /// Images and thumbnails
    File,
}

#[derive(Debug)]
struct Lane {
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl Lane {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_release: Mutex::new(None),
        }
    }
}

/// Enforces a minimum interval between requests of the same class
#[derive(Debug)]
pub struct RateGate {
    api: Lane,
    file: Lane,
}

impl RateGate {
    pub fn new(api_interval: Duration, file_interval: Duration) -> Self {
        Self {
            api: Lane::new(api_interval),
            file: Lane::new(file_interval),
        }
    }

    /// Builds a gate from the `api-wait` and `file-wait` settings
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            Duration::from_millis(config.api_wait),
            Duration::from_millis(config.file_wait),
        )
    }

    pub fn interval(&self, class: RequestClass) -> Duration {
        self.lane(class).interval
    }

    fn lane(&self, class: RequestClass) -> &Lane {
        match class {
            RequestClass::Api => &self.api,
            RequestClass::File => &self.file,
        }
    }

    /// Suspends until a request of `class` may be sent
    ///
    /// The remaining interval is slept with the class lock held. The sleep is
    /// recorded into `Timer::Wait`, the whole time from entry to release
    /// (queueing included) into `Timer::WaitWithLock`.
    ///
    /// # Returns
    ///
    /// The release instant
    pub async fn wait(&self, class: RequestClass, stats: &RunStats) -> Instant {
        let entered = Instant::now();
        let lane = self.lane(class);

        let mut last_release = lane.last_release.lock().await;
        if let Some(previous) = *last_release {
            let elapsed = previous.elapsed();
            if elapsed < lane.interval {
                let remaining = lane.interval - elapsed;
                tokio::time::sleep(remaining).await;
                stats.add_time(Timer::Wait, remaining);
            }
        }

        let released = Instant::now();
        *last_release = Some(released);
        drop(last_release);

        stats.add_time(Timer::WaitWithLock, entered.elapsed());
        released
    }
}
