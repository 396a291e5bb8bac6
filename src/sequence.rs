//! Sequence counters and their aggregation
//!
//! A [`Sequence`] tracks how far a producer or consumer has progressed through
//! the ring. Sequences are the only mutable shared state in the core; every
//! other component derives its view from acquire/release reads of them.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A monotonic sequence counter padded to its own cache line
///
/// Each instance has exactly one logical writer (the producer for the cursor,
/// a consumer for its own progress counter) and any number of readers, except
/// the multi-producer cursor which is advanced by CAS from several writers.
/// Writes use Release and reads Acquire ordering, so all memory effects a
/// writer performed before advancing the sequence are visible to a reader
/// that observes the new value. The cache-line padding keeps independently
/// mutated counters from sharing a line.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Compare and set the sequence value, returning whether the swap took place
    ///
    /// Used by multi-writer producers racing to claim the next slot.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Get the current value and then add `delta` to it
    #[inline]
    pub fn get_and_add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel)
    }

    /// Get the minimum value from a slice of sequences
    ///
    /// Returns `i64::MAX` for an empty slice so that an absent gate never
    /// holds a producer back.
    pub fn get_minimum_sequence(sequences: &[Arc<Sequence>]) -> i64 {
        sequences
            .iter()
            .map(|sequence| sequence.get())
            .min()
            .unwrap_or(i64::MAX)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(crate::INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get()).finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// An immutable, fixed group of sequences exposing the minimum of its members
///
/// Represents how far the slowest of a set of upstream consumers has
/// progressed. Membership is fixed at construction; the minimum is recomputed
/// on every read because members advance concurrently. The group borrows its
/// members - ownership stays with each sequence's single writer.
#[derive(Debug)]
pub struct FixedSequenceGroup {
    sequences: Box<[Arc<Sequence>]>,
}

impl FixedSequenceGroup {
    /// Create a group over the given sequences
    ///
    /// # Panics
    /// Panics if `sequences` is empty. A barrier with no upstream dependents
    /// gates directly on the producer cursor instead of an empty group; the
    /// barrier constructor performs that substitution.
    pub fn new(sequences: Vec<Arc<Sequence>>) -> Self {
        assert!(
            !sequences.is_empty(),
            "a sequence group must have at least one member"
        );
        Self {
            sequences: sequences.into_boxed_slice(),
        }
    }

    /// Current minimum over all members
    #[inline]
    pub fn value(&self) -> i64 {
        Sequence::get_minimum_sequence(&self.sequences)
    }
}

/// The upstream gate a consumer waits on
///
/// Either the producer cursor itself (no upstream consumers) or the minimum
/// of a fixed group of upstream consumer sequences. A closed set of variants
/// rather than a trait object: the choice is made once at wiring time and the
/// value is read on every iteration of the hot loop.
#[derive(Debug)]
pub enum DependentSequence {
    /// Gate directly on the producer cursor
    Cursor(Arc<Sequence>),
    /// Gate on the slowest of a fixed set of upstream consumer sequences
    Group(FixedSequenceGroup),
}

impl DependentSequence {
    /// Current value of the effective gate
    #[inline]
    pub fn value(&self) -> i64 {
        match self {
            DependentSequence::Cursor(cursor) => cursor.get(),
            DependentSequence::Group(group) => group.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new(42);
        assert_eq!(seq.get(), 42);
    }

    #[test]
    fn test_sequence_default() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), crate::INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_sequence_set_get() {
        let seq = Sequence::new(0);
        seq.set(100);
        assert_eq!(seq.get(), 100);
    }

    #[test]
    fn test_sequence_get_and_add() {
        let seq = Sequence::new(10);
        assert_eq!(seq.get_and_add(5), 10);
        assert_eq!(seq.get(), 15);

        assert_eq!(seq.get_and_add(3), 15);
        assert_eq!(seq.get(), 18);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);

        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_minimum_sequence_of_empty_slice() {
        assert_eq!(Sequence::get_minimum_sequence(&[]), i64::MAX);
    }

    #[test]
    fn test_fixed_sequence_group_minimum() {
        let seq1 = Arc::new(Sequence::new(5));
        let seq2 = Arc::new(Sequence::new(2));
        let seq3 = Arc::new(Sequence::new(9));

        let group = FixedSequenceGroup::new(vec![seq1, seq2.clone(), seq3]);
        assert_eq!(group.value(), 2);

        // Member updates are visible on the very next read.
        seq2.set(1);
        assert_eq!(group.value(), 1);

        seq2.set(12);
        assert_eq!(group.value(), 5);
    }

    #[test]
    #[should_panic(expected = "at least one member")]
    fn test_fixed_sequence_group_rejects_empty() {
        let _ = FixedSequenceGroup::new(Vec::new());
    }

    #[test]
    fn test_dependent_sequence_cursor_variant() {
        let cursor = Arc::new(Sequence::new(7));
        let dependent = DependentSequence::Cursor(cursor.clone());
        assert_eq!(dependent.value(), 7);

        cursor.set(11);
        assert_eq!(dependent.value(), 11);
    }

    #[test]
    fn test_dependent_sequence_group_variant() {
        let seq1 = Arc::new(Sequence::new(3));
        let seq2 = Arc::new(Sequence::new(8));
        let dependent =
            DependentSequence::Group(FixedSequenceGroup::new(vec![seq1.clone(), seq2]));
        assert_eq!(dependent.value(), 3);

        seq1.set(9);
        assert_eq!(dependent.value(), 8);
    }

    #[test]
    fn test_sequence_monotonic_observation_across_threads() {
        let seq = Arc::new(Sequence::default());
        let writer_seq = Arc::clone(&seq);

        let writer = thread::spawn(move || {
            for value in 0..=999 {
                writer_seq.set(value);
            }
        });

        // A reader must never observe the counter moving backwards.
        let mut last = crate::INITIAL_CURSOR_VALUE;
        loop {
            let observed = seq.get();
            assert!(observed >= last, "sequence moved backwards: {last} -> {observed}");
            last = observed;
            if observed == 999 {
                break;
            }
        }

        writer.join().unwrap();
    }
}
