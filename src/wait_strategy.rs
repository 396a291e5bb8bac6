//! Wait strategies for consumers with nothing to read
//!
//! A wait strategy decides how a consumer thread waits for its dependent
//! sequence to reach a target, trading CPU usage against wake latency:
//!
//! | strategy                  | latency  | CPU while waiting |
//! |---------------------------|----------|-------------------|
//! | [`BusySpinWaitStrategy`]  | lowest   | one full core     |
//! | [`YieldingWaitStrategy`]  | low      | high, shares core |
//! | [`SleepingWaitStrategy`]  | variable | low               |
//! | [`BlockingWaitStrategy`]  | highest  | near zero         |

use parking_lot::{Condvar, Mutex};
use std::hint;
use std::thread;
use std::time::Duration;

use crate::alert::Alert;
use crate::sequence::{DependentSequence, Sequence};

/// How a consumer thread waits for a target sequence to become available
///
/// Implementations return as soon as `dependent.value() >= sequence`, handing
/// back the observed value, which may exceed the target. If the alert becomes
/// active first, they return the current - possibly insufficient - dependent
/// value without failing; the barrier surfaces the cancellation on the
/// caller's next wait. Handing back the stale value lets a single wake-up
/// drain whatever did become available before the alert landed.
///
/// All variants re-test the exit condition after every wake, so spurious
/// wake-ups are harmless, and observe an alert within one iteration (spin
/// variants) or one signal round-trip (blocking).
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until `dependent.value() >= sequence` or the alert fires
    ///
    /// `cursor` is the producer cursor backing the ring; blocking variants
    /// park on it while spin variants only sample `dependent`.
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent: &DependentSequence,
        alert: &Alert,
    ) -> i64;

    /// Wake all threads parked in [`wait_for`](Self::wait_for)
    ///
    /// No-op for strategies that never park. Called by producers on every
    /// publish and by barriers when an alert is raised.
    fn signal_all_when_blocking(&self);
}

/// Tight re-check loop. Lowest latency, occupies a full core while waiting.
///
/// Use only when cores can be dedicated to consumers.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        _cursor: &Sequence,
        dependent: &DependentSequence,
        alert: &Alert,
    ) -> i64 {
        let mut available_sequence = dependent.value();
        while available_sequence < sequence {
            if alert.is_active() {
                return available_sequence;
            }
            hint::spin_loop();
            available_sequence = dependent.value();
        }
        available_sequence
    }

    fn signal_all_when_blocking(&self) {
        // Never parks, nothing to wake.
    }
}

/// Spin a bounded number of iterations, then yield the processor on every
/// iteration thereafter
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    /// Create a yielding wait strategy with the default spin budget
    pub fn new() -> Self {
        Self::with_spin_tries(100)
    }

    /// Create a yielding wait strategy that spins `spin_tries` iterations
    /// before it starts yielding
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        _cursor: &Sequence,
        dependent: &DependentSequence,
        alert: &Alert,
    ) -> i64 {
        let mut counter = self.spin_tries;
        let mut available_sequence = dependent.value();
        while available_sequence < sequence {
            if alert.is_active() {
                return available_sequence;
            }
            if counter > 0 {
                counter -= 1;
                hint::spin_loop();
            } else {
                thread::yield_now();
            }
            available_sequence = dependent.value();
        }
        available_sequence
    }

    fn signal_all_when_blocking(&self) {
        // Never parks, nothing to wake.
    }
}

/// Spin briefly, then yield, then sleep between re-checks
///
/// Sleeps start short and double up to `max_sleep`, so a wait that turns out
/// to be long stops burning CPU while a short one stays responsive. Wake
/// latency is bounded by the current sleep interval.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    retries: u32,
    max_sleep: Duration,
}

impl SleepingWaitStrategy {
    const DEFAULT_RETRIES: u32 = 200;
    const INITIAL_SLEEP: Duration = Duration::from_micros(1);

    /// Create a sleeping wait strategy with the default sleep ceiling
    pub fn new() -> Self {
        Self::with_max_sleep(Duration::from_micros(100))
    }

    /// Create a sleeping wait strategy whose escalating sleeps are capped at
    /// `max_sleep`
    pub fn with_max_sleep(max_sleep: Duration) -> Self {
        Self {
            retries: Self::DEFAULT_RETRIES,
            max_sleep,
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        _cursor: &Sequence,
        dependent: &DependentSequence,
        alert: &Alert,
    ) -> i64 {
        let mut counter = self.retries;
        let mut sleep = Self::INITIAL_SLEEP;
        let mut available_sequence = dependent.value();
        while available_sequence < sequence {
            if alert.is_active() {
                return available_sequence;
            }
            if counter > 100 {
                counter -= 1;
                hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(sleep);
                sleep = (sleep * 2).min(self.max_sleep);
            }
            available_sequence = dependent.value();
        }
        available_sequence
    }

    fn signal_all_when_blocking(&self) {
        // Never parks, nothing to wake.
    }
}

/// Park on a condition variable signaled by the producer on every publish and
/// by the barrier on alert
///
/// Highest wake latency of the four, lowest CPU usage. The park is bounded so
/// a lost signal degrades to a retry rather than a hang.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    const PARK_TIMEOUT: Duration = Duration::from_millis(1);

    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent: &DependentSequence,
        alert: &Alert,
    ) -> i64 {
        // Park until the producer cursor reaches the target, then spin out the
        // remaining distance on the dependent gate.
        if cursor.get() < sequence {
            let mut guard = self.lock.lock();
            while cursor.get() < sequence {
                if alert.is_active() {
                    drop(guard);
                    return dependent.value();
                }
                let _ = self.condvar.wait_for(&mut guard, Self::PARK_TIMEOUT);
            }
        }

        let mut available_sequence = dependent.value();
        while available_sequence < sequence {
            if alert.is_active() {
                return available_sequence;
            }
            hint::spin_loop();
            available_sequence = dependent.value();
        }
        available_sequence
    }

    fn signal_all_when_blocking(&self) {
        // Taking the lock orders the signal after any in-flight cursor check,
        // closing the check-then-park window.
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}
