// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let before = clock.now();
    let epoch_before = clock.epoch_secs();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - before, Duration::from_secs(90));
    assert_eq!(clock.epoch_secs() - epoch_before, 90);
}

#[test]
fn fake_clock_set_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_secs(1_700_000_000);
    assert_eq!(clock.epoch_secs(), 1_700_000_000);
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
