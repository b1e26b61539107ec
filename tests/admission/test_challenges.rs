// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chat_admission::admission::challenge::TOKEN_BYTES;
use chat_admission::admission::{ChallengeFailure, ChallengeStore};
use chat_admission::MockClock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Sum encoded in a question of the form "a + b = ?".
fn answer_of(question: &str) -> i64 {
    let expr = question.trim_end_matches("= ?").trim();
    expr.split('+')
        .map(|term| term.trim().parse::<i64>().unwrap())
        .sum()
}

#[test]
fn test_issued_challenge_shape() {
    let store = ChallengeStore::new(MockClock::shared_at(0));
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let challenge = store.issue_with_rng(&mut rng);
        assert_eq!(challenge.token.len(), TOKEN_BYTES * 2);
        assert!(challenge.token.chars().all(|c| c.is_ascii_hexdigit()));
        let answer = answer_of(&challenge.question);
        assert!((2..=20).contains(&answer));
    }
    assert_eq!(store.pending(), 50);
}

#[test]
fn test_challenge_is_single_use() {
    let store = ChallengeStore::new(MockClock::shared_at(0));
    let challenge = store.issue();
    let answer = answer_of(&challenge.question);

    assert_eq!(store.verify(&challenge.token, answer), Ok(()));
    assert_eq!(
        store.verify(&challenge.token, answer),
        Err(ChallengeFailure::NotFound)
    );
}

#[test]
fn test_wrong_answer_burns_token() {
    let store = ChallengeStore::new(MockClock::shared_at(0));
    let challenge = store.issue();
    let answer = answer_of(&challenge.question);

    assert_eq!(
        store.verify(&challenge.token, answer + 1),
        Err(ChallengeFailure::WrongAnswer)
    );
    assert!(!store.is_valid(&challenge.token, answer));
}

#[test]
fn test_challenge_expires_after_five_minutes() {
    let clock = MockClock::shared_at(1_000);
    let store = ChallengeStore::new(clock.clone());
    let late = store.issue();
    let on_time = store.issue();

    clock.advance(Duration::from_secs(5 * 60));
    assert!(store.is_valid(&on_time.token, answer_of(&on_time.question)));

    clock.advance(Duration::from_millis(1));
    assert_eq!(
        store.verify(&late.token, answer_of(&late.question)),
        Err(ChallengeFailure::Expired)
    );
}

#[test]
fn test_unknown_token_is_rejected() {
    let store = ChallengeStore::new(MockClock::shared_at(0));
    assert_eq!(store.verify("deadbeef", 4), Err(ChallengeFailure::NotFound));
}
