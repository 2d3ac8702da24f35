//! Periodic polling with change-only notification
//!
//! `Repeat` calls an async function on an interval and hands results to a
//! callback only when they differ from the last delivered result. The
//! interval is measured from the end of one call to the start of the
//! next, so calls never overlap. Must be created inside a tokio runtime.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOptions {
    pub interval: Duration,
    /// Run the first call right away instead of after one interval
    pub call_immediately: bool,
}

impl Default for RepeatOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            call_immediately: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatState {
    Active,
    Paused,
}

struct State<T> {
    state: RepeatState,
    interval: Duration,
    last: Option<T>,
    errored: bool,
    in_flight: bool,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every schedule and stop; stale timers compare and bail.
    epoch: u64,
}

type Func<T, E> = Box<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type Callback<T, E> = Box<dyn Fn(Result<T, E>) + Send + Sync>;

struct Inner<T, E> {
    func: Func<T, E>,
    callback: Callback<T, E>,
    state: Mutex<State<T>>,
}

/// Handle to a running repeater. Dropping it stops the schedule.
pub struct Repeat<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Repeat<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: std::fmt::Display + Send + 'static,
{
    pub fn spawn<F, Fut, C>(options: RepeatOptions, func: F, callback: C) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        C: Fn(Result<T, E>) + Send + Sync + 'static,
    {
        let inner = Arc::new(Inner {
            func: Box::new(move || func().boxed()),
            callback: Box::new(callback),
            state: Mutex::new(State {
                state: RepeatState::Active,
                interval: options.interval,
                last: None,
                errored: false,
                in_flight: false,
                timer: None,
                epoch: 0,
            }),
        });
        if options.call_immediately {
            Inner::run_now(&inner);
        } else {
            Inner::schedule(&inner);
        }
        Self { inner }
    }

    /// Pause. A pending timer is cancelled; an in-flight call completes
    /// and notifies but schedules nothing further.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.state = RepeatState::Paused;
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Resume if paused. If a call is still in flight, its completion
    /// schedules the next one.
    pub fn start(&self, call_immediately: bool) {
        {
            let mut state = self.inner.lock();
            if state.state == RepeatState::Active {
                return;
            }
            state.state = RepeatState::Active;
            if state.in_flight {
                return;
            }
        }
        if call_immediately {
            Inner::run_now(&self.inner);
        } else {
            Inner::schedule(&self.inner);
        }
    }

    /// Takes effect at the next scheduling decision.
    pub fn set_interval(&self, interval: Duration) {
        self.inner.lock().interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.inner.lock().interval
    }

    pub fn state(&self) -> RepeatState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == RepeatState::Active
    }

    /// True if the most recent call failed.
    pub fn errored(&self) -> bool {
        self.inner.lock().errored
    }

    /// Last successfully delivered result.
    pub fn last_result(&self) -> Option<T> {
        self.inner.lock().last.clone()
    }
}

impl<T, E> Drop for Repeat<T, E> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.state = RepeatState::Paused;
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: std::fmt::Display + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_now(this: &Arc<Self>) {
        let epoch = {
            let mut state = this.lock();
            state.epoch += 1;
            state.epoch
        };
        let runner = Arc::clone(this);
        tokio::spawn(async move { runner.tick(epoch).await });
    }

    fn schedule(this: &Arc<Self>) {
        let mut state = this.lock();
        state.epoch += 1;
        let epoch = state.epoch;
        let delay = state.interval;
        let runner = Arc::clone(this);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            runner.tick(epoch).await;
        }));
    }

    async fn tick(self: Arc<Self>, epoch: u64) {
        {
            let mut state = self.lock();
            if state.epoch != epoch || state.state != RepeatState::Active {
                return;
            }
            state.timer = None;
            state.in_flight = true;
        }

        let result = (self.func)().await;

        let notify = {
            let mut state = self.lock();
            state.in_flight = false;
            match &result {
                Ok(value) => {
                    let changed = state.errored || state.last.as_ref() != Some(value);
                    state.errored = false;
                    if changed {
                        state.last = Some(value.clone());
                    }
                    changed
                }
                Err(err) => {
                    debug!(error = %err, "repeated call failed");
                    state.errored = true;
                    true
                }
            }
        };
        if notify {
            (self.callback)(result);
        }

        let reschedule = {
            let state = self.lock();
            state.state == RepeatState::Active && state.timer.is_none()
        };
        if reschedule {
            Self::schedule(&self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    type Log<T> = Arc<Mutex<Vec<T>>>;

    fn sequence(values: Vec<i32>) -> (impl Fn() -> BoxFuture<'static, Result<i32, String>> + Send + Sync, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let values = Arc::new(values);
        let func = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let values = values.clone();
            async move {
                let value = values.get(n).or(values.last()).copied().unwrap_or_default();
                Ok::<_, String>(value)
            }
            .boxed()
        };
        (func, calls)
    }

    fn recorder<T: Send + 'static>() -> (Log<T>, impl Fn(T) + Send + Sync) {
        let log: Log<T> = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |v| sink.lock().unwrap().push(v))
    }

    // === Scenario: only changes are delivered ===

    #[tokio::test(start_paused = true)]
    async fn delivers_only_changed_results() {
        let (func, calls) = sequence(vec![1, 1, 2, 2, 3]);
        let (log, record) = recorder();
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: true },
            func,
            move |r: Result<i32, String>| record(r.unwrap()),
        );

        tokio::time::sleep(Duration::from_millis(4500)).await;
        repeat.stop();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(repeat.last_result(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn error_then_same_value_notifies_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (log, record) = recorder();
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: true },
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 1 {
                        Err("backend down".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            move |r: Result<i32, String>| record(r.is_ok()),
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(repeat.errored());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!repeat.errored());
        tokio::time::sleep(Duration::from_secs(1)).await;
        repeat.stop();

        // ok, err, ok (recovery), then unchanged
        assert_eq!(*log.lock().unwrap(), vec![true, false, true]);
    }

    // === Scenario: interval is additive to call duration ===

    #[tokio::test(start_paused = true)]
    async fn calls_never_overlap() {
        let starts: Log<Instant> = Arc::new(Mutex::new(Vec::new()));
        let marks = starts.clone();
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: true },
            move || {
                marks.lock().unwrap().push(Instant::now());
                async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok::<_, String>(0)
                }
            },
            |_| {},
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        repeat.stop();

        let starts = starts.lock().unwrap();
        assert!(starts.len() >= 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1500));
        }
    }

    // === Scenario: stop and start ===

    #[tokio::test(start_paused = true)]
    async fn stop_during_call_lets_it_finish_without_rescheduling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (log, record) = recorder();
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: true },
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) as i32;
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, String>(n)
                }
            },
            move |r: Result<i32, String>| record(r.unwrap()),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        repeat.stop();
        assert!(!repeat.is_active());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock().unwrap(), vec![0]);

        repeat.start(false);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        repeat.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_timer() {
        let (func, calls) = sequence(vec![1]);
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: false },
            func,
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        repeat.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        repeat.start(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        repeat.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn new_interval_applies_to_next_schedule() {
        let (func, calls) = sequence(vec![1]);
        let repeat = Repeat::spawn(
            RepeatOptions { interval: Duration::from_secs(1), call_immediately: true },
            func,
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        repeat.set_interval(Duration::from_secs(10));
        // the timer already armed for 1s still fires once
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(repeat.interval(), Duration::from_secs(10));
        repeat.stop();
    }
}
