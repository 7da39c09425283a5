//! `Watchdog`: stall detector for the main loop.
//!
//! The main loop calls `set()` before a potentially long operation and
//! `reset()` after it. If a reset does not follow within `timeout`, the
//! watchdog thread calls the callback ("bites") and keeps biting once per
//! timeout period until the reset arrives.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use lmkd_core::aloge;
use lmkd_core::config::LmkdConfig;
use lmkd_core::error::{LmkdError, LmkdResult};

type Callback = Box<dyn Fn() + Send + Sync>;

struct Counters {
    set_cnt: u64,
    reset_cnt: u64,
    stop: bool,
}

struct Inner {
    counters: Mutex<Counters>,
    cond: Condvar,
    timeout: Duration,
    callback: Callback,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for an outstanding `set()`. Returns the reset count to watch,
    /// or `None` when stopping.
    fn wait_for_set(&self) -> Option<u64> {
        let guard = self.lock();
        let guard = self
            .cond
            .wait_while(guard, |c| c.set_cnt == c.reset_cnt && !c.stop)
            .unwrap_or_else(PoisonError::into_inner);
        (!guard.stop).then_some(guard.reset_cnt)
    }

    /// True if `reset()` happened within the timeout, false on timeout,
    /// `None` when stopping.
    fn wait_for_reset(&self, reset_cnt: u64) -> Option<bool> {
        let guard = self.lock();
        let (guard, result) = self
            .cond
            .wait_timeout_while(guard, self.timeout, |c| c.reset_cnt == reset_cnt && !c.stop)
            .unwrap_or_else(PoisonError::into_inner);
        if guard.stop {
            return None;
        }
        Some(!result.timed_out() || guard.reset_cnt != reset_cnt)
    }
}

pub struct Watchdog {
    inner: Arc<Inner>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Watchdog {
    pub fn new<F>(timeout: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                counters: Mutex::new(Counters { set_cnt: 0, reset_cnt: 0, stop: false }),
                cond: Condvar::new(),
                timeout,
                callback: Box::new(callback),
            }),
            handle: None,
        }
    }

    /// Watchdog using `config.watchdog_timeout`.
    pub fn from_config<F>(config: &LmkdConfig, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(config.watchdog_timeout, callback)
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Spawn the watchdog thread. Calling it again is a no-op.
    pub fn start(&mut self) -> LmkdResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("lmkd-watchdog".into())
            .spawn(move || watchdog_main(inner))
            .map_err(|e| {
                aloge!("watchdog thread spawn failed: {}", e);
                LmkdError::Watchdog
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Arm: a matching `reset()` must follow within the timeout.
    pub fn set(&self) {
        self.inner.lock().set_cnt += 1;
        self.inner.cond.notify_one();
    }

    /// Disarm.
    pub fn reset(&self) {
        self.inner.lock().reset_cnt += 1;
        self.inner.cond.notify_one();
    }

    /// Invoke the callback directly.
    pub fn bite(&self) {
        (self.inner.callback)();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.inner.lock().stop = true;
        self.inner.cond.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn watchdog_main(inner: Arc<Inner>) {
    while let Some(reset_cnt) = inner.wait_for_set() {
        loop {
            match inner.wait_for_reset(reset_cnt) {
                Some(true) => break,
                // Bite, then give the main loop another period.
                Some(false) => (inner.callback)(),
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_watchdog(timeout: Duration) -> (Watchdog, Arc<AtomicUsize>) {
        let bites = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&bites);
        let wd = Watchdog::new(timeout, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (wd, bites)
    }

    #[test]
    fn test_bites_when_not_reset() {
        let (mut wd, bites) = counting_watchdog(Duration::from_millis(30));
        wd.start().unwrap();
        wd.set();
        thread::sleep(Duration::from_millis(250));
        assert!(bites.load(Ordering::SeqCst) >= 2);

        wd.reset();
        thread::sleep(Duration::from_millis(100));
        let after_reset = bites.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(bites.load(Ordering::SeqCst), after_reset);
    }

    #[test]
    fn test_no_bite_when_reset_in_time() {
        let (mut wd, bites) = counting_watchdog(Duration::from_millis(500));
        wd.start().unwrap();
        for _ in 0..5 {
            wd.set();
            thread::sleep(Duration::from_millis(5));
            wd.reset();
        }
        thread::sleep(Duration::from_millis(100));
        assert_eq!(bites.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_idle_watchdog_never_bites() {
        let (mut wd, bites) = counting_watchdog(Duration::from_millis(10));
        wd.start().unwrap();
        wd.start().unwrap();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(bites.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bite_calls_callback() {
        let (wd, bites) = counting_watchdog(Duration::from_secs(1));
        wd.bite();
        assert_eq!(bites.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let config = LmkdConfig::new().watchdog_timeout(Duration::from_secs(7));
        let wd = Watchdog::from_config(&config, || {});
        assert_eq!(wd.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_drop_stops_armed_thread() {
        let (mut wd, _bites) = counting_watchdog(Duration::from_secs(60));
        wd.start().unwrap();
        wd.set();
        thread::sleep(Duration::from_millis(20));
        drop(wd);
    }
}
