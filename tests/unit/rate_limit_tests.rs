// ==============================
// tests/unit/rate_limit_tests.rs
// ==============================
//! Login lockout per client address
use recipe_backend_lib::auth::AuthRateLimiter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

fn client(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
}

#[test]
fn test_rate_limiter_allows_initial_attempts() {
    let rate_limiter = AuthRateLimiter::default();
    assert!(rate_limiter.check_rate_limit(client(1)));
    assert_eq!(rate_limiter.tracked_clients(), 0);
}

#[test]
fn test_rate_limiter_blocks_after_max_attempts() {
    let rate_limiter = AuthRateLimiter::new(5, Duration::from_secs(300));
    let ip = client(2);

    for _ in 0..4 {
        rate_limiter.record_failed_attempt(ip);
    }
    assert!(rate_limiter.check_rate_limit(ip));

    rate_limiter.record_failed_attempt(ip);
    assert!(!rate_limiter.check_rate_limit(ip));
}

#[test]
fn test_rate_limiter_resets_after_success() {
    let rate_limiter = AuthRateLimiter::new(5, Duration::from_secs(300));
    let ip = client(3);

    for _ in 0..4 {
        rate_limiter.record_failed_attempt(ip);
    }
    rate_limiter.record_success(ip);

    // A full allowance is available again
    for _ in 0..4 {
        rate_limiter.record_failed_attempt(ip);
    }
    assert!(rate_limiter.check_rate_limit(ip));
}

#[test]
fn test_different_clients_tracked_separately() {
    let rate_limiter = AuthRateLimiter::new(3, Duration::from_secs(300));
    let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);

    for _ in 0..3 {
        rate_limiter.record_failed_attempt(client(4));
    }
    assert!(!rate_limiter.check_rate_limit(client(4)));
    assert!(rate_limiter.check_rate_limit(client(5)));
    assert!(rate_limiter.check_rate_limit(v6));
}

#[test]
fn test_lockout_expires() {
    let rate_limiter = AuthRateLimiter::new(2, Duration::from_millis(50));
    let ip = client(6);

    rate_limiter.record_failed_attempt(ip);
    rate_limiter.record_failed_attempt(ip);
    assert!(!rate_limiter.check_rate_limit(ip));

    std::thread::sleep(Duration::from_millis(80));
    assert!(rate_limiter.check_rate_limit(ip));

    // The count starts over after the lockout
    rate_limiter.record_failed_attempt(ip);
    assert!(rate_limiter.check_rate_limit(ip));
}

#[test]
fn test_cleanup_drops_finished_lockouts() {
    let rate_limiter = AuthRateLimiter::new(1, Duration::from_millis(20));
    rate_limiter.record_failed_attempt(client(7));
    assert_eq!(rate_limiter.tracked_clients(), 1);

    std::thread::sleep(Duration::from_millis(40));
    rate_limiter.cleanup();
    assert_eq!(rate_limiter.tracked_clients(), 0);
}

#[test]
fn test_zero_attempts_disables_limiting() {
    let rate_limiter = AuthRateLimiter::new(0, Duration::from_secs(300));
    let ip = client(8);

    for _ in 0..50 {
        rate_limiter.record_failed_attempt(ip);
    }
    assert!(rate_limiter.check_rate_limit(ip));
    assert_eq!(rate_limiter.tracked_clients(), 0);
}
