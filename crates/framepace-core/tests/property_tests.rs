//! Property-based tests for the bounded queue and the line framer
//!
//! The queue is checked against a `VecDeque` model; the framer against the
//! records that were joined to build its input.

use std::collections::VecDeque;

use framepace_core::{BoundedQueue, FramerConfig, FramerEvent, LineFramer};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum QueueOp {
    Put(u8),
    Get,
}

/// Generate a queue operation, biased slightly towards puts
fn arb_queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        3 => any::<u8>().prop_map(QueueOp::Put),
        2 => Just(QueueOp::Get),
    ]
}

/// Generate one record that contains no delimiter or carriage return
fn arb_record(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no delimiters", |b| *b != b'\n' && *b != b'\r'), 1..=max_len)
}

proptest! {
    /// Property: the queue behaves like a FIFO bounded by its capacity
    #[test]
    fn queue_matches_fifo_model(
        capacity in 1usize..16,
        ops in prop::collection::vec(arb_queue_op(), 0..200),
    ) {
        let queue = BoundedQueue::new("model", capacity).unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                QueueOp::Put(byte) => {
                    let accepted = queue.try_put(byte).is_ok();
                    prop_assert_eq!(accepted, model.len() < capacity);
                    if accepted {
                        model.push_back(byte);
                    }
                }
                QueueOp::Get => {
                    prop_assert_eq!(queue.try_get(), model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert!(queue.len() <= capacity);
        }
    }

    /// Property: records that fit are emitted unchanged and in order
    #[test]
    fn framer_recovers_joined_records(
        capacity in 1usize..64,
        records in prop::collection::vec(arb_record(64), 0..20),
    ) {
        let fitting: Vec<Vec<u8>> = records
            .into_iter()
            .filter(|r| r.len() <= capacity)
            .collect();
        let mut stream = Vec::new();
        for record in &fitting {
            stream.extend_from_slice(record);
            stream.push(b'\n');
        }

        let mut framer = LineFramer::with_capacity(capacity);
        let lines: Vec<Vec<u8>> = framer
            .feed(&stream)
            .into_iter()
            .map(|event| match event {
                FramerEvent::Line(line) => line,
                FramerEvent::Overflow { .. } => panic!("unexpected overflow"),
            })
            .collect();

        prop_assert_eq!(lines, fitting);
        prop_assert!(framer.is_empty());
    }

    /// Property: no emitted line ever exceeds the buffer, whatever the input
    #[test]
    fn framer_never_emits_oversized_lines(
        capacity in 1usize..32,
        stream in prop::collection::vec(prop_oneof![4 => any::<u8>(), 1 => Just(b'\n')], 0..512),
    ) {
        let mut framer = LineFramer::new(FramerConfig {
            capacity,
            strip_carriage_return: false,
            ..FramerConfig::default()
        });
        for event in framer.feed(&stream) {
            if let FramerEvent::Line(line) = event {
                prop_assert!(!line.is_empty());
                prop_assert!(line.len() <= capacity);
                prop_assert!(!line.contains(&b'\n'));
            }
        }
        prop_assert!(framer.buffered().len() <= capacity);
        prop_assert_eq!(framer.stats().bytes_in, stream.len() as u64);
    }
}
