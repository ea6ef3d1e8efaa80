//! Shared test utilities for the stream adapter tests.
//!
//! - Adapter construction over a mock line with given timeouts
//! - Elapsed-time assertions for deadline checks
//! - Polling helper for state changed by background tasks

#![allow(dead_code)]

use serial_stream_adapter::port::{
    AdapterSettings, BlockingStreamAdapter, InputStreamOptions, MockChannel, MockDevice,
    StreamResource, Timeout,
};
use std::time::{Duration, Instant};

/// Slack allowed below a deadline for timer granularity.
pub const TIMER_SLACK: Duration = Duration::from_millis(5);

/// Adapter over a fresh mock line, with both timeouts set through the
/// adapter so they are propagated like a transport would do it.
pub fn adapter_with_timeouts(
    name: &str,
    read: Timeout,
    write: Timeout,
) -> (BlockingStreamAdapter<MockChannel>, MockDevice) {
    let (channel, device) = MockChannel::pair(name);
    let mut adapter = BlockingStreamAdapter::new(channel).expect("adapter over mock line");
    adapter.set_read_timeout(read).expect("set read timeout");
    adapter.set_write_timeout(write).expect("set write timeout");
    (adapter, device)
}

/// Adapter whose input endpoint uses the given completion rule.
pub fn adapter_with_mode(
    name: &str,
    mode: InputStreamOptions,
    read: Timeout,
) -> (BlockingStreamAdapter<MockChannel>, MockDevice) {
    let (channel, device) = MockChannel::builder(name).read_timeout(read).build();
    let settings = AdapterSettings {
        input_mode: mode,
        ..AdapterSettings::default()
    };
    let adapter =
        BlockingStreamAdapter::with_settings(channel, settings).expect("adapter over mock line");
    (adapter, device)
}

/// Run `f` and return its result with the wall time it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

/// Assert `elapsed` honoured a deadline of `deadline` without overshooting
/// past `ceiling`.
pub fn assert_deadline(elapsed: Duration, deadline: Duration, ceiling: Duration) {
    assert!(
        elapsed + TIMER_SLACK >= deadline,
        "returned after {elapsed:?}, before the {deadline:?} deadline"
    );
    assert!(
        elapsed < ceiling,
        "returned after {elapsed:?}, expected well under {ceiling:?}"
    );
}

/// Poll `check` until it holds or `within` elapses.
pub fn wait_until(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < within {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}
