// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chat_admission::admission::RateBucketStore;
use chat_admission::{AdmissionConfig, MockClock};
use std::sync::Arc;
use std::time::Duration;

const START: u64 = 1_700_000_000_000;

fn store(per_minute: u32, per_hour: u32) -> (RateBucketStore, Arc<MockClock>) {
    let clock = MockClock::shared_at(START);
    let config = AdmissionConfig {
        max_requests_per_minute: per_minute,
        max_requests_per_hour: per_hour,
        ..AdmissionConfig::default()
    };
    (RateBucketStore::new(&config, clock.clone()), clock)
}

#[test]
fn test_minute_window_caps_burst() {
    let (buckets, _clock) = store(2, 20);

    assert!(buckets.try_consume("1.2.3.4"));
    assert!(buckets.try_consume("1.2.3.4"));
    assert!(!buckets.try_consume("1.2.3.4"));
}

#[test]
fn test_minute_window_refills_after_interval() {
    let (buckets, clock) = store(2, 20);
    assert!(buckets.try_consume("ip"));
    assert!(buckets.try_consume("ip"));

    clock.advance(Duration::from_secs(59));
    assert!(!buckets.try_consume("ip"));

    clock.advance(Duration::from_secs(1));
    assert!(buckets.try_consume("ip"));
    assert_eq!(buckets.available("ip").minute, 1);
}

#[test]
fn test_hour_window_applies_across_minutes() {
    let (buckets, clock) = store(10, 15);
    let mut allowed = 0;
    for _ in 0..5 {
        for _ in 0..10 {
            if buckets.try_consume("ip") {
                allowed += 1;
            }
        }
        clock.advance(Duration::from_secs(60));
    }
    assert_eq!(allowed, 15);
    assert_eq!(buckets.available("ip").hour, 0);

    clock.advance(Duration::from_secs(55 * 60));
    assert!(buckets.try_consume("ip"));
}

#[test]
fn test_denied_request_consumes_nothing() {
    let (buckets, clock) = store(1, 2);
    assert!(buckets.try_consume("ip"));
    assert!(!buckets.try_consume("ip"));
    assert_eq!(buckets.available("ip").hour, 1);

    clock.advance(Duration::from_secs(60));
    assert!(buckets.try_consume("ip"));
    assert!(!buckets.try_consume("ip"));
}

#[test]
fn test_identities_are_independent() {
    let (buckets, _clock) = store(1, 10);
    assert!(buckets.try_consume("a"));
    assert!(!buckets.try_consume("a"));
    assert!(buckets.try_consume("b"));
    assert_eq!(buckets.tracked_identities(), 2);
}

#[test]
fn test_sweep_drops_only_refilled_identities() {
    let (buckets, clock) = store(5, 100);
    buckets.try_consume("old");
    clock.advance(Duration::from_secs(30 * 60));
    buckets.try_consume("new");
    clock.advance(Duration::from_secs(31 * 60));

    assert_eq!(buckets.sweep(), 1);
    assert_eq!(buckets.tracked_identities(), 1);
    assert_eq!(buckets.available("new").hour, 99);
}
