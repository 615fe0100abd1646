//! Cancellable repeating task on a background thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

/// Default interval between position samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `tick` every `interval` until the closure returns `false` or the task
/// is cancelled.
pub struct RepeatingTask {
    finish: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let finish = Arc::new(AtomicBool::new(false));
        let thread_finish = finish.clone();
        let handle = thread::spawn(move || {
            let mut deadline = Instant::now() + interval;
            loop {
                let now = Instant::now();
                if now < deadline {
                    thread::park_timeout(deadline - now);
                }
                if thread_finish.load(Ordering::Acquire) {
                    break;
                }
                if Instant::now() < deadline {
                    continue;
                }
                deadline += interval;
                if !tick() {
                    thread_finish.store(true, Ordering::Release);
                    break;
                }
            }
        });

        Self {
            finish,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for its thread, unless called from that thread.
    pub fn cancel(&mut self) {
        self.finish.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                warn!("repeating task cancelled from its own thread; skipping join");
                return;
            }
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("repeating task panicked during join");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish.load(Ordering::Acquire)
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_until_closure_declines() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = RepeatingTask::spawn(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst) + 1 < 3
        });

        let started = Instant::now();
        while !task.is_finished() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(task.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancel_stops_ticking_promptly() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut task = RepeatingTask::spawn(Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let started = Instant::now();
        task.cancel();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(task.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
