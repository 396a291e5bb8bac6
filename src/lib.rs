//! `RingGate` - Sequence coordination core for ring-buffer messaging
//!
//! The coordination machinery by which consumer threads discover which slots
//! of a shared, pre-allocated circular buffer have become safely readable,
//! without locks on the hot path and without busy-waiting forever.
//!
//! ## Features
//!
//! - **Lock-free**: Uses only atomic operations and memory barriers on the hot path
//! - **Gap-aware**: Resolves out-of-order publication within claimed ranges
//! - **Mechanical sympathy**: Cache-line padded counters to avoid false sharing
//! - **Pluggable waiting**: Busy-spin, yielding, sleeping and blocking strategies
//! - **Cooperative shutdown**: Alerts wake blocked consumers without interrupting them
//!
//! ## Quick Start
//!
//! ```rust
//! use ringgate::{BlockingWaitStrategy, SequenceBarrier, Sequencer, SingleProducerSequencer};
//! use std::sync::Arc;
//!
//! // One wait strategy instance is shared by the sequencer (which signals on
//! // publish) and the barrier (which waits on it).
//! let wait_strategy = Arc::new(BlockingWaitStrategy::new());
//! let sequencer: Arc<dyn Sequencer> =
//!     Arc::new(SingleProducerSequencer::new(1024, wait_strategy.clone()));
//!
//! // A barrier with no upstream dependencies gates directly on the cursor.
//! let barrier = SequenceBarrier::new(sequencer.clone(), wait_strategy, Vec::new());
//!
//! // Claim and publish one slot; the consumer side may now read up to it.
//! let sequence = sequencer.next().unwrap();
//! sequencer.publish(sequence);
//! assert_eq!(barrier.wait_for(sequence).unwrap(), sequence);
//!
//! // Shutdown: wake anything parked in wait_for and fail subsequent waits.
//! barrier.alert();
//! assert!(barrier.wait_for(sequence + 1).is_err());
//! ```
//!
//! ## Architecture
//!
//! - **[`Sequence`]**: Atomic progress counter for one producer or consumer
//! - **[`FixedSequenceGroup`]**: Minimum over a fixed set of upstream sequences
//! - **[`Alert`]**: Cooperative cancellation flag owned by a barrier
//! - **[`WaitStrategy`]**: Trade-off between CPU usage and wake latency
//! - **[`Sequencer`]**: Producer-side authority with the gap-aware publication query
//! - **[`SequenceBarrier`]**: The facade a consumer polls in its hot loop

pub mod alert;
pub mod barrier;
pub mod sequence;
pub mod sequencer;
pub mod wait_strategy;


pub use alert::Alert;
pub use barrier::SequenceBarrier;
pub use sequence::{DependentSequence, FixedSequenceGroup, Sequence};
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

/// The initial cursor value for sequences
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the coordination core
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A wait was cut short by an alert on its barrier. Recoverable: the
    /// caller should wind down, optionally clear the alert, and may resume.
    #[error("wait cancelled by alert")]
    Cancelled,

    /// A claim would wrap the ring over slots not yet consumed.
    #[error("insufficient ring capacity for claim")]
    InsufficientCapacity,
}

pub type Result<T> = std::result::Result<T, GateError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
