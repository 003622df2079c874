use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use super::common::{epoch, user};
use crate::workflows::replacement::clock::ManualClock;
use crate::workflows::replacement::domain::ReplacementId;
use crate::workflows::replacement::throttle::{ThrottlePolicy, WithdrawalLimiter};

fn limiter() -> (WithdrawalLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(epoch()));
    let limiter = WithdrawalLimiter::new(ThrottlePolicy::default(), clock.clone());
    (limiter, clock)
}

fn replacement(id: &str) -> ReplacementId {
    ReplacementId(id.to_string())
}

#[test]
fn first_withdrawal_is_allowed() {
    let (limiter, _clock) = limiter();
    assert!(limiter.acquire(&user("u-x"), &replacement("req-1")).is_ok());
}

#[test]
fn immediate_retry_on_same_request_is_denied_with_full_wait() {
    let (limiter, _clock) = limiter();
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("first withdrawal allowed");

    let wait = limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect_err("second withdrawal denied");
    assert_eq!(wait, Duration::from_secs(3));
}

#[test]
fn actor_spacing_applies_across_requests() {
    let (limiter, clock) = limiter();
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("first withdrawal allowed");

    let wait = limiter
        .acquire(&user("u-x"), &replacement("req-2"))
        .expect_err("immediate withdrawal on another request denied");
    assert_eq!(wait, Duration::from_secs(1));

    // The denial restamped the retry window for that key.
    clock.advance(ChronoDuration::milliseconds(3_100));
    limiter
        .acquire(&user("u-x"), &replacement("req-2"))
        .expect("withdrawal allowed once the cooldown elapsed");
}

#[test]
fn spacing_alone_clears_without_a_denial() {
    let (limiter, clock) = limiter();
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("first withdrawal allowed");

    clock.advance(ChronoDuration::milliseconds(1_500));
    limiter
        .acquire(&user("u-x"), &replacement("req-2"))
        .expect("withdrawal on another request allowed after spacing");
}

#[test]
fn every_denial_restamps_the_retry_window() {
    let (limiter, clock) = limiter();
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("first withdrawal allowed");

    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect_err("immediate retry denied");

    clock.advance(ChronoDuration::seconds(2));
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect_err("retry inside the restamped window denied");

    clock.advance(ChronoDuration::seconds(2));
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect_err("window was restamped again");

    clock.advance(ChronoDuration::milliseconds(3_100));
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("retry allowed after a quiet cooldown");
}

#[test]
fn actors_are_throttled_independently() {
    let (limiter, _clock) = limiter();
    limiter
        .acquire(&user("u-x"), &replacement("req-1"))
        .expect("first actor allowed");
    limiter
        .acquire(&user("u-y"), &replacement("req-1"))
        .expect("second actor unaffected by the first");
}
