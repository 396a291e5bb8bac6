//! Integration tests for barrier coordination across real threads

use ringgate::{
    BlockingWaitStrategy, GateError, Sequence, SequenceBarrier, Sequencer,
    SingleProducerSequencer, WaitStrategy, YieldingWaitStrategy,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LAST_SEQUENCE: i64 = 999;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn wire_single_producer(
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
) -> (Arc<dyn Sequencer>, Arc<SequenceBarrier>) {
    let sequencer: Arc<dyn Sequencer> = Arc::new(SingleProducerSequencer::new(
        buffer_size,
        wait_strategy.clone(),
    ));
    let barrier = Arc::new(SequenceBarrier::new(
        sequencer.clone(),
        wait_strategy,
        Vec::new(),
    ));
    (sequencer, barrier)
}

#[test]
fn one_producer_four_consumers_observe_every_sequence() {
    init_tracing();
    let (sequencer, barrier) = wire_single_producer(1024, Arc::new(YieldingWaitStrategy::new()));

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let barrier = Arc::clone(&barrier);
        consumers.push(thread::spawn(move || {
            let mut next_sequence = 0i64;
            loop {
                let available = barrier.wait_for(next_sequence).unwrap();
                // The wait only ends once the target is reached, and the
                // resolved ceiling never exceeds what was published.
                assert!(available >= next_sequence);
                assert!(available <= LAST_SEQUENCE);
                next_sequence = available + 1;
                if available == LAST_SEQUENCE {
                    break;
                }
            }
        }));
    }

    let producer = thread::spawn(move || {
        for _ in 0..=LAST_SEQUENCE {
            let sequence = sequencer.next().unwrap();
            sequencer.publish(sequence);
        }
    });

    producer.join().unwrap();
    for consumer in consumers {
        consumer.join().unwrap();
    }
}

#[test]
fn wait_blocks_until_sequence_is_published() {
    init_tracing();
    let (sequencer, barrier) = wire_single_producer(16, Arc::new(BlockingWaitStrategy::new()));

    let waiter_barrier = Arc::clone(&barrier);
    let waiter = thread::spawn(move || waiter_barrier.wait_for(5).unwrap());

    // Nothing is published yet, so the consumer must still be parked.
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    for _ in 0..=5 {
        let sequence = sequencer.next().unwrap();
        sequencer.publish(sequence);
    }

    assert_eq!(waiter.join().unwrap(), 5);
}

#[test]
fn alert_wakes_parked_consumer_and_fails_next_wait() {
    init_tracing();
    let (sequencer, barrier) = wire_single_producer(16, Arc::new(BlockingWaitStrategy::new()));

    let waiter_barrier = Arc::clone(&barrier);
    let waiter = thread::spawn(move || waiter_barrier.wait_for(0));

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    barrier.alert();

    // A call parked before the alert returns promptly with an insufficient
    // value and the cancellation surfaces on the next wait; a call that
    // entered after the alert fails directly.
    match waiter.join().unwrap() {
        Ok(interrupted) => assert!(interrupted < 0),
        Err(error) => assert_eq!(error, GateError::Cancelled),
    }
    assert_eq!(barrier.wait_for(0), Err(GateError::Cancelled));

    // A controlled restart: clear the alert and waiting works again.
    barrier.clear_alert();
    let sequence = sequencer.next().unwrap();
    sequencer.publish(sequence);
    assert_eq!(barrier.wait_for(0).unwrap(), 0);
}

#[test]
fn downstream_barrier_follows_upstream_consumer() {
    init_tracing();
    let wait_strategy: Arc<dyn WaitStrategy> = Arc::new(YieldingWaitStrategy::new());
    let sequencer: Arc<dyn Sequencer> = Arc::new(SingleProducerSequencer::new(
        64,
        wait_strategy.clone(),
    ));

    let upstream_progress = Arc::new(Sequence::default());
    let downstream_barrier = Arc::new(SequenceBarrier::new(
        sequencer.clone(),
        wait_strategy,
        vec![Arc::clone(&upstream_progress)],
    ));

    for _ in 0..10 {
        let sequence = sequencer.next().unwrap();
        sequencer.publish(sequence);
    }

    let barrier = Arc::clone(&downstream_barrier);
    let downstream = thread::spawn(move || barrier.wait_for(7).unwrap());

    thread::sleep(Duration::from_millis(50));
    assert!(!downstream.is_finished());

    // The downstream consumer may not pass the upstream one, however far the
    // producer has published.
    upstream_progress.set(7);
    assert_eq!(downstream.join().unwrap(), 7);
}
