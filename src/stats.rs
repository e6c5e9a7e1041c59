//! Rolling counter and stats driver: an operator-visible write/error rate,
//! counted off the hot path through a bounded single-consumer queue.
//!
//! Counting on the hot path must stay wait-free enough not to dominate
//! write latency; submitting to a bounded channel drained by one dedicated
//! worker keeps the arithmetic branchless and avoids per-op atomics, at the
//! cost of one hop. The queue's bound is the deliberate backpressure valve:
//! a caller blocks on `count()` under sustained overload rather than the
//! counter silently falling behind.

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Sender};
use log::info;

/// Default depth of the counter's submission queue.
pub const COUNTER_QUEUE_DEPTH: usize = 100;

/// Number of 1-second ticks between stats log lines.
pub const STATS_LOG_INTERVAL: u64 = 5;

enum Msg {
    Count,
    Tick,
}

/// A single rolling counter: total count, current-second count, last
/// completed second's count, and a 10-slot ring buffer of recent
/// per-second samples.
struct CounterState {
    total: u64,
    one_sec: u64,
    last_sec: u64,
    ten_sec: [u64; 10],
    i10: usize,
    start_sec: u64,
}

impl CounterState {
    fn new(now_sec: u64) -> Self {
        Self {
            total: 0,
            one_sec: 0,
            last_sec: 0,
            ten_sec: [0; 10],
            i10: 0,
            start_sec: now_sec,
        }
    }

    fn count(&mut self) {
        self.total += 1;
        self.one_sec += 1;
        self.ten_sec[self.i10] = self.one_sec;
    }

    fn tick(&mut self) {
        self.i10 = (self.i10 + 1) % 10;
        self.last_sec = self.one_sec;
        self.one_sec = 0;
    }

    fn render(&self, now_sec: u64) -> String {
        let ten_sec_avg = self.ten_sec.iter().sum::<u64>() as f64 / 10.0;
        let elapsed = now_sec.saturating_sub(self.start_sec).max(1);
        let all_time_avg = self.total as f64 / elapsed as f64;
        format!(
            "total: {}, 1s: {}, 10s: {:.2}, all time avg: {:.2}",
            self.total, self.last_sec, ten_sec_avg, all_time_avg
        )
    }
}

/// A handle to a counter whose mutable state is owned by a single
/// dedicated worker thread; `count()` and `tick()` submit to a bounded
/// channel rather than touching shared state directly.
pub struct Counter {
    tx: Sender<Msg>,
    render_tx: Sender<channel::Sender<String>>,
    _worker: JoinHandle<()>,
}

impl Counter {
    /// Spawns the counter's worker thread.
    pub fn new(now_sec: u64) -> Self {
        let (tx, rx) = channel::bounded::<Msg>(COUNTER_QUEUE_DEPTH);
        let (render_tx, render_rx) = channel::unbounded::<channel::Sender<String>>();

        let worker = thread::Builder::new()
            .name("astore-counter".into())
            .spawn(move || {
                let mut state = CounterState::new(now_sec);
                loop {
                    select! {
                        recv(rx) -> msg => match msg {
                            Ok(Msg::Count) => state.count(),
                            Ok(Msg::Tick) => state.tick(),
                            Err(_) => return,
                        },
                        recv(render_rx) -> reply => match reply {
                            Ok(reply_tx) => {
                                let now = now_sec_unchecked();
                                let _ = reply_tx.send(state.render(now));
                            }
                            Err(_) => return,
                        },
                    }
                }
            })
            .expect("failed to spawn counter worker thread");

        Self {
            tx,
            render_tx,
            _worker: worker,
        }
    }

    /// Increments the counter. Blocks the caller if the submission queue
    /// is full — deliberate backpressure under sustained overload.
    pub fn count(&self) {
        let _ = self.tx.send(Msg::Count);
    }

    /// Advances the counter to the next second boundary.
    pub fn tick(&self) {
        let _ = self.tx.send(Msg::Tick);
    }

    /// Renders the counter's current display string.
    pub fn render(&self) -> String {
        let (reply_tx, reply_rx) = channel::bounded(1);
        if self.render_tx.send(reply_tx).is_err() {
            return String::from("total: 0, 1s: 0, 10s: 0.00, all time avg: 0.00");
        }
        reply_rx.recv().unwrap_or_default()
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn now_sec_unchecked() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The pair of counters the store façade feeds: successful writes and
/// failed writes.
pub struct Stats {
    /// Count of successful `write_to_key` calls.
    pub writes: Counter,
    /// Count of failed `write_to_key` calls.
    pub errors: Counter,
}

impl Stats {
    /// Creates both counters, anchored to the current wall-clock second.
    pub fn new() -> Self {
        let now = now_sec_unchecked();
        Self {
            writes: Counter::new(now),
            errors: Counter::new(now),
        }
    }

    /// Spawns the process-wide driver thread: ticks both counters once a
    /// second, logging them at `info` level every `STATS_LOG_INTERVAL`
    /// ticks, forever (until the process exits).
    pub fn spawn_driver(self: std::sync::Arc<Self>) -> JoinHandle<()> {
        thread::Builder::new()
            .name("astore-stats-driver".into())
            .spawn(move || {
                let mut ticks: u64 = 0;
                loop {
                    thread::sleep(Duration::from_secs(1));
                    self.writes.tick();
                    self.errors.tick();
                    ticks += 1;
                    if ticks % STATS_LOG_INTERVAL == 0 {
                        info!("writes: {}", self.writes);
                        info!("errors: {}", self.errors);
                    }
                }
            })
            .expect("failed to spawn stats driver thread")
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_into_total() {
        let counter = Counter::new(0);
        for _ in 0..5 {
            counter.count();
        }
        counter.tick();
        let rendered = counter.render();
        assert!(rendered.starts_with("total: 5, 1s: 5"));
    }

    #[test]
    fn tick_resets_one_second_bucket() {
        let counter = Counter::new(0);
        counter.count();
        counter.tick();
        counter.tick();
        let rendered = counter.render();
        assert!(rendered.contains("1s: 0"));
        assert!(rendered.starts_with("total: 1"));
    }
}
