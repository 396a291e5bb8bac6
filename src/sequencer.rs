//! Sequencers: the producer-side authority consulted by barriers
//!
//! A sequencer owns the cursor, hands out claims, and answers the gap-aware
//! publication query. Barriers consult it read-only: the cursor tells them
//! how far claiming has progressed, and
//! [`get_highest_published_sequence`](Sequencer::get_highest_published_sequence)
//! resolves which of those slots are individually published and therefore
//! safe to read.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::sequence::Sequence;
use crate::wait_strategy::WaitStrategy;
use crate::{is_power_of_two, GateError, Result};

/// Producer-side sequencing authority
pub trait Sequencer: Send + Sync + std::fmt::Debug {
    /// The cursor sequence tracking publication progress
    fn cursor(&self) -> Arc<Sequence>;

    /// Capacity of the ring this sequencer guards
    fn buffer_size(&self) -> usize;

    /// Claim the next sequence for publication
    ///
    /// # Errors
    /// Fails with [`GateError::InsufficientCapacity`] when the claim would
    /// wrap the ring over slots not yet consumed by the gating sequences.
    fn next(&self) -> Result<i64>;

    /// Mark a claimed sequence as published and wake blocked consumers
    fn publish(&self, sequence: i64);

    /// Whether an individual slot has been published
    fn is_available(&self, sequence: i64) -> bool;

    /// The highest sequence in `[lower_bound, available_sequence]` such that
    /// every slot from `lower_bound` up to it is individually published
    ///
    /// Returns `lower_bound - 1` when even the lower bound is not published.
    /// Producers may reserve a contiguous range and complete slots within it
    /// in any order, so a cursor past X does not imply slot X is readable.
    /// Allocation-free and safe under concurrent calls from many consumers;
    /// it only reads shared state.
    fn get_highest_published_sequence(&self, lower_bound: i64, available_sequence: i64) -> i64;

    /// Register consumer sequences the producer must not overtake
    fn add_gating_sequences(&self, gating_sequences: &[Arc<Sequence>]);

    /// Minimum over the registered gating sequences, `i64::MAX` when none
    fn minimum_gating_sequence(&self) -> i64;
}

/// Sequencer for exactly one publishing thread
///
/// The claim counter is kept apart from the cursor: the cursor only advances
/// on publish, so every sequence at or below it is published and the gating
/// query degenerates to the identity.
#[derive(Debug)]
pub struct SingleProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    /// Highest claimed sequence. Written only by the owning producer thread.
    next_claim: Sequence,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// # Panics
    /// Panics if `buffer_size` is not a power of 2.
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        assert!(
            is_power_of_two(buffer_size),
            "buffer size must be a power of 2"
        );
        debug!(buffer_size, "single-producer sequencer created");
        Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            next_claim: Sequence::default(),
            gating_sequences: RwLock::new(Vec::new()),
        }
    }
}

impl Sequencer for SingleProducerSequencer {
    fn cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn next(&self) -> Result<i64> {
        let next_sequence = self.next_claim.get() + 1;
        let wrap_point = next_sequence - self.buffer_size as i64;

        if wrap_point > self.minimum_gating_sequence() {
            return Err(GateError::InsufficientCapacity);
        }

        self.next_claim.set(next_sequence);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    fn get_highest_published_sequence(&self, lower_bound: i64, available_sequence: i64) -> i64 {
        debug_assert!(lower_bound <= available_sequence);
        // With a single producer the cursor only moves on publish, so the
        // observed range is contiguous by construction.
        available_sequence
    }

    fn add_gating_sequences(&self, gating_sequences: &[Arc<Sequence>]) {
        self.gating_sequences.write().extend_from_slice(gating_sequences);
    }

    fn minimum_gating_sequence(&self) -> i64 {
        Sequence::get_minimum_sequence(&self.gating_sequences.read())
    }
}

/// Sequencer for concurrently publishing threads
///
/// Producers race on the cursor with CAS to claim slots and mark completion
/// per slot in an availability array. Slots within a claimed range may
/// complete in any order, which is why consumers must resolve contiguity
/// through the gating query instead of trusting the cursor.
#[derive(Debug)]
pub struct MultiProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    /// Per-slot availability flags. A slot stores the round number of the
    /// sequence last published into it, which also defeats ABA across wraps.
    available_buffer: Vec<AtomicI32>,
    index_mask: usize,
    index_shift: u32,
    /// Cached gating minimum so claims rarely re-read the gating sequences.
    cached_gating_sequence: AtomicI64,
}

impl MultiProducerSequencer {
    /// Create a new multi producer sequencer
    ///
    /// # Panics
    /// Panics if `buffer_size` is not a power of 2.
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        assert!(
            is_power_of_two(buffer_size),
            "buffer size must be a power of 2"
        );
        debug!(buffer_size, "multi-producer sequencer created");

        let available_buffer = (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();
        Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            gating_sequences: RwLock::new(Vec::new()),
            available_buffer,
            index_mask: buffer_size - 1,
            index_shift: buffer_size.trailing_zeros(),
            cached_gating_sequence: AtomicI64::new(crate::INITIAL_CURSOR_VALUE),
        }
    }

    fn calculate_index(&self, sequence: i64) -> usize {
        (sequence as usize) & self.index_mask
    }

    fn calculate_availability_flag(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    fn set_available(&self, sequence: i64) {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].store(flag, Ordering::Release);
    }
}

impl Sequencer for MultiProducerSequencer {
    fn cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn next(&self) -> Result<i64> {
        loop {
            let current = self.cursor.get();
            let next_sequence = current + 1;
            let wrap_point = next_sequence - self.buffer_size as i64;

            let mut cached = self.cached_gating_sequence.load(Ordering::Acquire);
            if wrap_point > cached {
                cached = self.minimum_gating_sequence();
                self.cached_gating_sequence.store(cached, Ordering::Release);

                if wrap_point > cached {
                    return Err(GateError::InsufficientCapacity);
                }
            }

            if self.cursor.compare_and_set(current, next_sequence) {
                return Ok(next_sequence);
            }
            // Another producer claimed this sequence, try again.
        }
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].load(Ordering::Acquire) == flag
    }

    fn get_highest_published_sequence(&self, lower_bound: i64, available_sequence: i64) -> i64 {
        debug_assert!(lower_bound <= available_sequence);
        let mut sequence = lower_bound;
        while sequence <= available_sequence {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        available_sequence
    }

    fn add_gating_sequences(&self, gating_sequences: &[Arc<Sequence>]) {
        self.gating_sequences.write().extend_from_slice(gating_sequences);
    }

    fn minimum_gating_sequence(&self) -> i64 {
        Sequence::get_minimum_sequence(&self.gating_sequences.read())
    }
}
