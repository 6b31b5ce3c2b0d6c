//! End-to-end behaviour of the uplink: filter → queue → wake → transmitter → sink.

use std::{
    io::Read,
    net::TcpListener,
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

use sensor_uplink::{
    Admission, Classification, Lifecycle, MemoryTransport, Pipeline, PipelineConfig, Reading,
    SubmitError, TcpTransport, Uplink, UplinkError, WakeReason, WireFormat,
};

fn r(value: f32) -> Reading {
    Reading::new(1, 1, value)
}

/// Polls `cond` for up to three seconds.
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn values(bytes: &[u8]) -> Vec<f32> {
    WireFormat::Compact
        .decode_all(bytes)
        .iter()
        .map(|r| r.value)
        .collect()
}

#[test]
fn filtered_readings_never_reach_the_sink() {
    let sink = MemoryTransport::new();
    let uplink = Uplink::start(&PipelineConfig::default(), sink.clone()).unwrap();
    let pipeline = Arc::clone(uplink.pipeline());
    pipeline.seed_reference(50.0).unwrap();

    assert_eq!(uplink.submit(r(50.0)).unwrap(), Admission::Filtered);
    assert_eq!(uplink.submit(r(52.0)).unwrap(), Admission::Filtered);
    assert_eq!(
        uplink.submit(r(54.0)).unwrap(),
        Admission::Queued {
            classification: Some(Classification::Elevated),
            woke: None,
        }
    );
    assert_eq!(pipeline.reference(), 54.0);
    assert_eq!(
        uplink.submit(r(70.0)).unwrap(),
        Admission::Queued {
            classification: Some(Classification::Critical),
            woke: Some(WakeReason::Critical),
        }
    );
    assert_eq!(pipeline.reference(), 70.0);

    assert!(wait_until(|| sink.send_count() == 1));
    assert_eq!(values(&sink.sends()[0]), vec![54.0, 70.0]);

    let snap = uplink.shutdown();
    assert_eq!(snap.filtered, 2);
    assert_eq!(snap.readings_sent, 2);
    assert_eq!(snap.wake_critical, 1);
}

#[test]
fn concurrent_fill_wakes_exactly_once() {
    let config = PipelineConfig {
        enable_threshold_filter: false,
        ..PipelineConfig::default()
    };
    let pipeline = Arc::new(Pipeline::new(&config).unwrap());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let p = Arc::clone(&pipeline);
            let b = Arc::clone(&barrier);
            thread::spawn(move || {
                b.wait();
                p.submit(Reading::new(t, 1, 27.0))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let queued = results.iter().filter(|r| matches!(r, Ok(a) if a.is_queued())).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(SubmitError::QueueFull { .. })))
        .count();
    let woke = results
        .iter()
        .filter(|r| matches!(r, Ok(Admission::Queued { woke: Some(_), .. })))
        .count();

    assert_eq!(queued, 5);
    assert_eq!(full, 3);
    // A rejected submitter may be the one that observes the full queue first.
    assert!(woke <= 1);
    assert!(pipeline.queue().is_full());
    assert_eq!(pipeline.signal().transitions(), 1);
    let snap = pipeline.stats().snapshot();
    assert_eq!(snap.wake_queue_full, 1);
    assert_eq!(snap.total_wakes(), 1);
    assert_eq!(snap.dropped_full, 3);
}

#[test]
fn simultaneous_critical_readings_collapse_into_one_wake() {
    let pipeline = Arc::new(Pipeline::new(&PipelineConfig::default()).unwrap());
    pipeline.seed_reference(100.0).unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let p = Arc::clone(&pipeline);
            let b = Arc::clone(&barrier);
            thread::spawn(move || {
                b.wait();
                // Far outside the seeded band; whichever lands first is critical.
                let value = if t % 2 == 0 { 1_000.0 } else { -1_000.0 };
                p.submit(Reading::new(t, 1, value)).unwrap()
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(pipeline.signal().lifecycle(), Lifecycle::Running);
    assert_eq!(pipeline.signal().transitions(), 1);
    assert_eq!(pipeline.stats().snapshot().wake_critical, 1);
}

#[test]
fn timer_flushes_a_partial_queue() {
    let config = PipelineConfig {
        max_time_ms: 50,
        ..PipelineConfig::default()
    };
    let sink = MemoryTransport::new();
    let uplink = Uplink::start(&config, sink.clone()).unwrap();

    let admission = uplink.submit(r(27.0)).unwrap();
    assert!(matches!(admission, Admission::Queued { woke: None, .. }));

    assert!(wait_until(|| sink.send_count() == 1));
    assert_eq!(values(&sink.received()), vec![27.0]);
    assert!(wait_until(|| uplink.pipeline().signal().lifecycle() == Lifecycle::Parked));

    let snap = uplink.shutdown();
    assert!(snap.wake_timer >= 1);
}

#[test]
fn failed_connect_is_retried_on_a_later_wake() {
    let config = PipelineConfig {
        max_time_ms: 50,
        ..PipelineConfig::default()
    };
    let sink = MemoryTransport::new();
    sink.fail_next_connects(1);
    let uplink = Uplink::start(&config, sink.clone()).unwrap();
    uplink.pipeline().seed_reference(100.0).unwrap();

    uplink.submit(r(150.0)).unwrap();

    assert!(wait_until(|| sink.send_count() == 1));
    assert_eq!(values(&sink.received()), vec![150.0]);
    assert!(sink.connect_count() >= 2);

    let snap = uplink.shutdown();
    assert_eq!(snap.transport_errors, 1);
    assert_eq!(snap.readings_lost, 0);
}

#[test]
fn shutdown_flushes_what_is_left() {
    let sink = MemoryTransport::new();
    let uplink = Uplink::start(&PipelineConfig::default(), sink.clone()).unwrap();
    uplink.pipeline().seed_reference(100.0).unwrap();

    uplink.submit(r(110.0)).unwrap();
    uplink.submit(r(100.0)).unwrap();
    assert_eq!(sink.send_count(), 0);

    let snap = uplink.shutdown();
    assert_eq!(values(&sink.received()), vec![110.0, 100.0]);
    assert_eq!(snap.readings_sent, 2);
    assert_eq!(snap.wake_shutdown, 1);
}

#[test]
fn idle_shutdown_is_not_a_spurious_cycle() {
    let uplink = Uplink::start(&PipelineConfig::default(), MemoryTransport::new()).unwrap();
    thread::sleep(Duration::from_millis(20));

    let snap = uplink.shutdown();
    assert_eq!(snap.wake_shutdown, 1);
    assert_eq!(snap.cycles, 0);
    assert_eq!(snap.spurious_wakes, 0);
}

#[test]
fn flush_restarts_the_periodic_interval() {
    let config = PipelineConfig {
        max_time_ms: 300,
        ..PipelineConfig::default()
    };
    let sink = MemoryTransport::new();
    let uplink = Uplink::start(&config, sink.clone()).unwrap();
    uplink.pipeline().seed_reference(100.0).unwrap();

    // Critical flush shortly before the first timer deadline.
    thread::sleep(Duration::from_millis(200));
    uplink.submit(r(150.0)).unwrap();
    assert!(wait_until(|| sink.send_count() == 1));
    assert!(wait_until(|| uplink.pipeline().signal().lifecycle() == Lifecycle::Parked));
    let flushed_at = Instant::now();

    // 10 % from 150: queued, no wake of its own.
    let admission = uplink.submit(r(165.0)).unwrap();
    assert!(matches!(admission, Admission::Queued { woke: None, .. }));

    assert!(wait_until(|| sink.send_count() == 2));
    // The original deadline was ~100 ms after the flush; the reset one ~300 ms.
    assert!(flushed_at.elapsed() >= Duration::from_millis(200));

    let snap = uplink.shutdown();
    assert_eq!(snap.wake_critical, 1);
    assert_eq!(snap.wake_timer, 1);
}

#[test]
fn invalid_configuration_refuses_to_start() {
    let config = PipelineConfig {
        transmission_buffer_size: 4,
        ..PipelineConfig::default()
    };
    let err = Uplink::start(&config, MemoryTransport::new()).err().unwrap();
    assert!(matches!(err, UplinkError::Config(_)));
}

#[test]
fn tcp_sink_receives_one_connection_per_cycle() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        data
    });

    let transport = TcpTransport::new(addr, Duration::from_secs(2), Duration::from_secs(2));
    let uplink = Uplink::start(&PipelineConfig::default(), transport).unwrap();
    uplink.pipeline().seed_reference(20.0).unwrap();
    uplink.submit(Reading::new(4, 2, 30.0)).unwrap();

    let data = server.join().unwrap();
    let readings = WireFormat::Compact.decode_all(&data);
    assert_eq!(readings, vec![Reading::new(4, 2, 30.0)]);

    uplink.shutdown();
}
