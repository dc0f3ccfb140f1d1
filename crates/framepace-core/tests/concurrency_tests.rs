//! Concurrency tests for the signal, queue and entity guard
//!
//! These run on the multi-threaded runtime so tasks genuinely interleave.

use std::sync::Arc;
use std::time::Duration;

use framepace_core::{
    Arena, Ball, BoundedQueue, Color, EntityGuard, FramerEvent, LineFramer, Resettable, Signal,
    SyncError,
};

#[derive(Debug, Clone, Default)]
struct Counter {
    value: u64,
    // Written together with `value`; a torn update shows up as a mismatch
    shadow: u64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_guarded_increments_are_not_lost() {
    const TASKS: u64 = 2;
    const INCREMENTS: u64 = 1000;

    let guard = Arc::new(EntityGuard::new("counter", Counter::default(), None));
    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let guard = guard.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..INCREMENTS {
                guard
                    .with_entity(|counter| {
                        let next = counter.value + 1;
                        std::hint::black_box(&next);
                        counter.value = next;
                        counter.shadow += 1;
                    })
                    .await?;
                tokio::task::yield_now().await;
            }
            Ok::<_, SyncError>(())
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let counter = guard.snapshot().await.unwrap();
    assert_eq!(counter.value, TASKS * INCREMENTS);
    assert_eq!(counter.shadow, counter.value);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ball_stays_in_bounds_under_concurrent_steps() {
    let ball = Ball::new(Arena::new(320.0, 240.0), 10.0, Color::BLACK, (900.0, -700.0));
    let guard = Arc::new(EntityGuard::new("ball", ball, Some(Duration::from_secs(5))));

    let stepper = {
        let guard = guard.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                guard
                    .with_entity(|ball| ball.step(Duration::from_millis(16)))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    let kicker = {
        let guard = guard.clone();
        tokio::spawn(async move {
            for i in 0..500 {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                guard
                    .with_entity(|ball| {
                        ball.apply_impulse(40.0 * sign, -25.0 * sign);
                        ball.clamp_speed(1500.0);
                    })
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    let observer = {
        let guard = guard.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                let ball = guard.snapshot().await.unwrap();
                assert!(ball.is_within_arena(), "observed {:?}", ball.position());
                tokio::task::yield_now().await;
            }
        })
    };

    stepper.await.unwrap();
    kicker.await.unwrap();
    observer.await.unwrap();
    assert_eq!(guard.snapshot().await.unwrap().updates(), 500);
}

#[tokio::test]
async fn test_reset_then_read_observes_canonical_ball() {
    let ball = Ball::new(Arena::new(640.0, 480.0), 20.0, Color::BLACK, (100.0, 100.0));
    let guard = EntityGuard::new("ball", ball, None);

    guard
        .with_entity(|ball| {
            ball.apply_impulse(250.0, -40.0);
            ball.step(Duration::from_millis(700));
        })
        .await
        .unwrap();
    guard.reset().await.unwrap();

    let ball = guard.snapshot().await.unwrap();
    assert_eq!(ball.position(), (320.0, 240.0));
    assert_eq!(ball.velocity(), (100.0, 100.0));
}

#[tokio::test]
async fn test_resettable_is_usable_outside_the_guard() {
    let mut ball = Ball::new(Arena::new(100.0, 100.0), 5.0, Color(0xFF0000), (10.0, 0.0));
    ball.x = 7.0;
    Resettable::reset(&mut ball);
    assert_eq!(ball.position(), (50.0, 50.0));
}

#[tokio::test(start_paused = true)]
async fn test_stale_frames_are_drained_before_pacing() {
    let frame = Signal::counting("frame", 4, 0).unwrap();
    for _ in 0..4 {
        frame.post();
    }
    assert_eq!(frame.drain(), 4);

    // With the backlog gone the next wait blocks until a fresh post
    let err = frame.wait(Some(Duration::from_millis(30))).await.unwrap_err();
    assert!(err.is_deadline_missed());
    frame.post();
    frame.wait(Some(Duration::from_millis(30))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_producer_framer_pipeline_preserves_order() {
    let queue = BoundedQueue::new("uart", 10).unwrap();
    let sentences = [
        "$GPGGA,1*6A",
        "$GPGLL,2*6B",
        "$GPGSA,3*6C",
        "$GPGSV,4*6D",
        "$GPRMC,5*6E",
        "$GPZDA,6*6F",
    ];

    let producer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for sentence in sentences {
                for byte in sentence.bytes().chain(*b"\r\n") {
                    queue.put(byte, Some(Duration::from_secs(5))).await?;
                }
            }
            Ok::<_, SyncError>(())
        })
    };

    let mut framer = LineFramer::with_capacity(128);
    let mut lines = Vec::new();
    while lines.len() < sentences.len() {
        let byte = queue.get(Some(Duration::from_secs(5))).await.unwrap();
        if let Some(event) = framer.push(byte) {
            lines.extend(event.line_text());
        }
    }
    producer.await.unwrap().unwrap();

    assert_eq!(lines, sentences);
    assert!(queue.is_empty());
    assert!(framer.is_empty());
    assert!(!matches!(framer.push(b'\n'), Some(FramerEvent::Overflow { .. })));
}
