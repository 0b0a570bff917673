//! Run control shared between the caller and running stages.
//!
//! A [`StopSignal`] is raised by whoever wants the pipeline to end (the CLI,
//! a test, a failing stage) and polled by the runtime between firings, by
//! queue retries and by handoff waits. A firing in progress always
//! completes. [`Pacer`] is the periodic timer that gives the first stage of
//! a threaded pipeline its period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while pacing, so a stop is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(5);

/// Cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// A signal that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once any clone raised the signal.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Periodic timer.
///
/// Deadlines advance by exactly one period per [`Pacer::wait`]; after an
/// overrun the schedule restarts from the current instant instead of
/// bursting to catch up.
#[derive(Debug)]
pub struct Pacer {
    period: Duration,
    next: Instant,
    overruns: u64,
}

impl Pacer {
    /// Timer whose first deadline is one `period` from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
            overruns: 0,
        }
    }

    /// Period length.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadlines that had already passed when `wait` was called.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Sleep until the next deadline. Returns `false` if `stop` was raised
    /// before it arrived.
    pub fn wait(&mut self, stop: &StopSignal) -> bool {
        let now = Instant::now();
        if self.next <= now {
            if !self.period.is_zero() {
                self.overruns += 1;
                log::trace!("pacer overrun by {:?}", now - self.next);
            }
            self.next = now + self.period;
            return !stop.is_stopped();
        }
        loop {
            if stop.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= self.next {
                break;
            }
            std::thread::sleep((self.next - now).min(STOP_POLL));
        }
        self.next += self.period;
        !stop.is_stopped()
    }
}
