// End-to-end producer/consumer tests through the builder surface.
// Run with: cargo test --test queue -- --nocapture

#![cfg(target_os = "linux")]

use std::sync::Once;
use std::thread;
use std::time::Duration;

use serial_test::serial;
use shmring::core::sync::SyncKind;
use shmring::queue::layout::header_size;
use shmring::{QueueBuilder, QueueError};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn queue_name(tag: &str) -> String {
    format!("shmring-queue-{}-{}", std::process::id(), tag)
}

fn roundtrip_with_backend(tag: &str, kind: SyncKind) {
    init_tracing();
    let name = queue_name(tag);

    let producer = QueueBuilder::new(&name)
        .with_total_size(header_size() + 4096)
        .with_sync(kind)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(&name)
        .with_total_size(header_size() + 4096)
        .with_sync(kind)
        .build_consumer()
        .unwrap();

    let payloads: Vec<Vec<u8>> = (0..100)
        .map(|_| {
            let len = fastrand::usize(..512);
            (0..len).map(|_| fastrand::u8(..)).collect()
        })
        .collect();

    let pusher = {
        let payloads = payloads.clone();
        thread::spawn(move || {
            for payload in &payloads {
                producer.push(payload).unwrap();
            }
            producer.close().unwrap();
        })
    };

    for expected in &payloads {
        let got = consumer.pop().unwrap().expect("payload before termination");
        assert_eq!(&got, expected);
    }

    // Termination is the last observation, repeatably.
    assert!(consumer.pop().unwrap().is_none());
    assert!(consumer.pop().unwrap().is_none());

    pusher.join().unwrap();
}

#[test]
fn futex_backend_roundtrip() {
    roundtrip_with_backend("futex", SyncKind::Futex);
}

#[test]
fn pthread_backend_roundtrip() {
    roundtrip_with_backend("pthread", SyncKind::Pthread);
}

#[test]
#[serial]
fn backpressure_preserves_order() {
    init_tracing();
    let name = queue_name("pressure");
    // Ring far smaller than the data pushed through it: the producer must
    // repeatedly block and resume as the reader drains frames.
    let total = header_size() + 128;

    let producer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_consumer()
        .unwrap();

    let pusher = thread::spawn(move || {
        for i in 0..500u32 {
            let payload = vec![(i % 256) as u8; 32];
            producer.push(&payload).unwrap();
        }
        producer.close().unwrap();
    });

    for i in 0..500u32 {
        let got = consumer.pop().unwrap().expect("payload before termination");
        assert_eq!(got, vec![(i % 256) as u8; 32]);
        // A slow consumer stalls the producer, never corrupts the stream.
        if i % 100 == 0 {
            thread::sleep(Duration::from_millis(5));
        }
    }
    assert!(consumer.pop().unwrap().is_none());

    pusher.join().unwrap();
}

#[test]
fn push_after_close_is_rejected() {
    init_tracing();
    let name = queue_name("closed");

    let producer = QueueBuilder::new(&name)
        .with_total_size(header_size() + 256)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(&name)
        .with_total_size(header_size() + 256)
        .build_consumer()
        .unwrap();

    producer.push(b"only frame").unwrap();
    producer.close().unwrap();

    assert!(matches!(
        producer.push(b"too late"),
        Err(QueueError::Closed)
    ));
    assert!(matches!(producer.close(), Err(QueueError::Closed)));

    assert_eq!(consumer.pop().unwrap().unwrap(), b"only frame");
    assert!(consumer.pop().unwrap().is_none());
}

#[test]
fn consumer_first_then_producer() {
    init_tracing();
    let name = queue_name("consumer-first");
    let total = header_size() + 1024;

    // Whoever starts first creates the region; the producer then attaches.
    let consumer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_consumer()
        .unwrap();
    let producer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_producer()
        .unwrap();

    producer.push(b"hello").unwrap();
    producer.close().unwrap();

    assert_eq!(consumer.pop().unwrap().unwrap(), b"hello");
    assert!(consumer.pop().unwrap().is_none());
}

#[test]
fn oversized_push_fails_without_blocking() {
    init_tracing();
    let name = queue_name("oversized");

    let producer = QueueBuilder::new(&name)
        .with_total_size(header_size() + 64)
        .build_producer()
        .unwrap();

    let payload = vec![0u8; 64];
    match producer.push(&payload) {
        Err(QueueError::CapacityExceeded { framed, capacity }) => {
            assert_eq!(framed, 68);
            assert_eq!(capacity, 64);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }

    assert_eq!(producer.max_payload(), 59);
}

#[test]
fn attach_to_uninitialized_region_is_rejected() {
    init_tracing();
    use shmring::core::create_shared_memory;
    use shmring::queue::region::QueueRegion;

    let name = queue_name("uninit");
    let total = header_size() + 256;
    // A raw region that no queue endpoint ever initialized: zero magic.
    let _raw = create_shared_memory(&name, total).unwrap();

    match QueueRegion::attach(&name, total) {
        Err(QueueError::Allocation(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::InvalidData);
        }
        other => panic!("expected Allocation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn interleaved_push_pop_stress() {
    init_tracing();
    let name = queue_name("stress");
    let total = header_size() + 512;

    let producer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(&name)
        .with_total_size(total)
        .build_consumer()
        .unwrap();

    let count = 5_000u32;
    let pusher = thread::spawn(move || {
        for i in 0..count {
            producer.push(&i.to_le_bytes()).unwrap();
        }
        producer.close().unwrap();
    });

    let mut received = 0u32;
    while let Some(bytes) = consumer.pop().unwrap() {
        assert_eq!(bytes, received.to_le_bytes());
        received += 1;
    }
    assert_eq!(received, count);

    pusher.join().unwrap();
}
