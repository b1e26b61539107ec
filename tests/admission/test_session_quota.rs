// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chat_admission::admission::session_quota::SESSION_TTL;
use chat_admission::admission::SessionQuotaManager;
use chat_admission::{AdmissionConfig, MockClock};
use std::sync::Arc;
use std::time::Duration;

fn manager(max: u32) -> (SessionQuotaManager, Arc<MockClock>) {
    let clock = MockClock::shared_at(1_700_000_000_000);
    let config = AdmissionConfig {
        max_conversations_per_session: max,
        ..AdmissionConfig::default()
    };
    (SessionQuotaManager::new(&config, clock.clone()), clock)
}

#[test]
fn test_ten_turns_then_blocked() {
    let (quotas, _clock) = manager(10);
    for turn in 1..=10 {
        assert!(quotas.can_chat("session-a"));
        assert_eq!(quotas.increment("session-a"), turn);
        assert_eq!(quotas.remaining_count("session-a"), 10 - turn);
    }
    assert!(!quotas.can_chat("session-a"));
    assert!(quotas.can_chat("session-b"));
}

#[test]
fn test_reset_restores_full_quota() {
    let (quotas, _clock) = manager(2);
    quotas.increment("s");
    quotas.increment("s");
    assert!(!quotas.can_chat("s"));

    assert!(quotas.reset("s"));
    assert_eq!(quotas.used_count("s"), 0);
    assert!(quotas.can_chat("s"));
}

#[test]
fn test_expired_session_reads_as_new() {
    let (quotas, clock) = manager(2);
    quotas.increment("s");
    quotas.increment("s");

    clock.advance(SESSION_TTL + Duration::from_millis(1));
    assert!(quotas.can_chat("s"));
    assert_eq!(quotas.remaining_count("s"), 2);
    assert_eq!(quotas.tracked_sessions(), 0);
}

#[test]
fn test_reservation_released_on_failure() {
    let (quotas, _clock) = manager(1);

    let turn = quotas.begin_turn("s").expect("fresh session has a slot");
    drop(turn);
    assert_eq!(quotas.used_count("s"), 0);

    let turn = quotas.begin_turn("s").expect("slot released");
    assert_eq!(turn.complete(), 1);
    assert!(quotas.begin_turn("s").is_none());
}
