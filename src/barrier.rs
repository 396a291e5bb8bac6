//! The sequence barrier: the facade a consumer polls in its hot loop
//!
//! A barrier composes the producer cursor, the dependent gate, the wait
//! strategy, the sequencer's publication query and an owned cancellation
//! flag into the one question every consumer asks: up to which sequence may
//! I safely read?

use std::sync::Arc;
use tracing::debug;

use crate::alert::Alert;
use crate::sequence::{DependentSequence, FixedSequenceGroup, Sequence};
use crate::sequencer::Sequencer;
use crate::wait_strategy::WaitStrategy;
use crate::Result;

/// Gating point between a consumer and everything upstream of it
///
/// Constructed once per consumer (or per group of consumers sharing it) at
/// wiring time and kept for the processing lifetime. Holds no state beyond
/// its wired references and the alert flag; behavior is a pure function of
/// the current sequence values and the alert.
#[derive(Debug)]
pub struct SequenceBarrier {
    cursor: Arc<Sequence>,
    dependent: DependentSequence,
    wait_strategy: Arc<dyn WaitStrategy>,
    sequencer: Arc<dyn Sequencer>,
    alert: Alert,
}

impl SequenceBarrier {
    /// Wire a barrier over the sequencer's cursor
    ///
    /// An empty `dependent_sequences` list gates the barrier directly on the
    /// cursor; otherwise it gates on the minimum of the given sequences. The
    /// substitution happens here, never per call. The wait strategy must be
    /// the same instance the sequencer signals on publish, or parked
    /// consumers will only wake on the park timeout.
    pub fn new(
        sequencer: Arc<dyn Sequencer>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        let cursor = sequencer.cursor();
        let dependent = if dependent_sequences.is_empty() {
            DependentSequence::Cursor(Arc::clone(&cursor))
        } else {
            DependentSequence::Group(FixedSequenceGroup::new(dependent_sequences))
        };
        Self {
            cursor,
            dependent,
            wait_strategy,
            sequencer,
            alert: Alert::new(),
        }
    }

    /// Wait until `sequence` may be read and return the highest sequence that
    /// is safely readable, which may exceed the request
    ///
    /// Returns a value below `sequence` when the wait was cut short by an
    /// alert; the caller detects the shortfall and loops, and the next call
    /// fails with [`GateError::Cancelled`](crate::GateError::Cancelled). That
    /// one extra round lets a consumer drain whatever became available before
    /// the alert landed.
    ///
    /// # Errors
    /// Fails with `Cancelled` when the barrier is already alerted on entry.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.alert.check()?;

        let available_sequence =
            self.wait_strategy
                .wait_for(sequence, &self.cursor, &self.dependent, &self.alert);

        if available_sequence < sequence {
            return Ok(available_sequence);
        }

        Ok(self
            .sequencer
            .get_highest_published_sequence(sequence, available_sequence))
    }

    /// Current value of the effective dependent gate
    ///
    /// Advisory: it may be stale by the time the caller acts on it.
    pub fn cursor(&self) -> i64 {
        self.dependent.value()
    }

    /// Whether the cancellation flag is raised
    pub fn is_alerted(&self) -> bool {
        self.alert.is_active()
    }

    /// Raise the cancellation flag and wake any parked waiters
    ///
    /// Cooperative only: waiting threads observe the flag at their next
    /// check rather than being interrupted.
    pub fn alert(&self) {
        self.alert.activate();
        self.wait_strategy.signal_all_when_blocking();
        debug!("sequence barrier alerted");
    }

    /// Lower the cancellation flag so subsequent waits proceed normally
    ///
    /// Used when a consumer is restarted after a controlled pause rather
    /// than a full shutdown.
    pub fn clear_alert(&self) {
        self.alert.deactivate();
        debug!("sequence barrier alert cleared");
    }
}
