//! Windowed rate limiter with a concurrency cap.
//!
//! [`RateLimiter::run`] gates an async task behind two constraints: at most
//! `max_concurrent` admitted tasks in flight, and at most `max_per_window`
//! task starts inside any trailing `window`. Callers are admitted strictly in
//! the order they called `run`.
//!
//! ## Admission
//!
//! ```text
//! run(task)
//!   │ admission.lock()      fair mutex, one caller admitting at a time
//!   │ starts: prune, wait   sleeps until the oldest start leaves the window
//!   │ slots.acquire()       fair semaphore, waits for a free slot
//!   │ starts.push(now)      start recorded, admission released
//!   └ task().await          permit dropped on every exit path
//! ```
//!
//! A caller waiting for a slot or for the window holds the admission lock, so
//! nobody behind it can overtake. Dropping a `run` future at any point
//! releases whatever it holds.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::error::ConfigError;

/// Default trailing window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

/// Default maximum starts per window.
pub const DEFAULT_MAX_PER_WINDOW: usize = 5;

/// Default maximum tasks in flight.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Limits applied by a [`RateLimiter`]. All values are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    window: Duration,
    max_per_window: usize,
    max_concurrent: usize,
}

impl RateLimitConfig {
    pub fn new(
        window: Duration,
        max_per_window: usize,
        max_concurrent: usize,
    ) -> Result<Self, ConfigError> {
        if window.is_zero() {
            return Err(ConfigError::Invalid {
                key: "window",
                reason: "must be greater than 0".to_string(),
            });
        }
        if max_per_window == 0 {
            return Err(ConfigError::Invalid {
                key: "max_per_window",
                reason: "must be greater than 0".to_string(),
            });
        }
        if max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                key: "max_concurrent",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            window,
            max_per_window,
            max_concurrent,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_per_window: DEFAULT_MAX_PER_WINDOW,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Bounds the start rate and concurrency of arbitrary async tasks.
///
/// Share it as `Arc<RateLimiter>`; `run` may be called from many tasks at once.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Serialises admission so callers are admitted FIFO.
    admission: AsyncMutex<()>,
    /// One permit per in-flight task.
    slots: Arc<Semaphore>,
    /// Start instants inside the trailing window, oldest first.
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        debug!(
            window_ms = config.window.as_millis() as u64,
            max_per_window = config.max_per_window,
            max_concurrent = config.max_concurrent,
            "RateLimiter: configured",
        );
        Self {
            config,
            admission: AsyncMutex::new(()),
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            starts: Mutex::new(VecDeque::with_capacity(config.max_per_window)),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of admitted tasks that have not yet finished. A caller still
    /// waiting on the window is not counted.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent - self.slots.available_permits()
    }

    /// Runs `task` once admitted and returns its output unchanged.
    ///
    /// The slot is released when the task finishes, fails, or is dropped.
    pub async fn run<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.admit().await;
        task().await
    }

    async fn admit(&self) -> OwnedSemaphorePermit {
        let _turn = self.admission.lock().await;

        // Only this caller can add starts while it holds `_turn`, so once the
        // window has room it keeps having room.
        loop {
            let now = Instant::now();
            let wait_until = {
                let mut starts = self.starts.lock().unwrap_or_else(PoisonError::into_inner);
                while starts
                    .front()
                    .is_some_and(|&start| now.duration_since(start) >= self.config.window)
                {
                    starts.pop_front();
                }
                if starts.len() < self.config.max_per_window {
                    break;
                }
                // Full window: the oldest start must age out first.
                starts
                    .front()
                    .map(|&oldest| oldest + self.config.window)
                    .unwrap_or(now)
            };

            debug!(
                delay_ms = wait_until.saturating_duration_since(now).as_millis() as u64,
                "RateLimiter: window full, delaying admission",
            );
            tokio::time::sleep_until(wait_until).await;
        }

        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is owned by `self` and never closed.
            Err(_) => unreachable!("rate limiter semaphore closed"),
        };

        self.starts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Instant::now());
        permit
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
