// Licensed under the Apache-2.0 license

//! Helpers for waiting on hardware conditions.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use thiserror::Error;

/// Returned by [`poll_count`] when the condition never held.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("condition not met after {polls} polls")]
pub struct PollTimeout {
    pub polls: u32,
}

/// Evaluate `f` until it returns `true`, at most `max_polls` times, sleeping
/// `interval` between attempts.
///
/// Returns the number of polls it took. A zero `interval` spins without
/// sleeping.
pub fn poll_count<F>(max_polls: u32, interval: Duration, mut f: F) -> Result<u32, PollTimeout>
where
    F: FnMut() -> bool,
{
    for attempt in 1..=max_polls {
        if f() {
            return Ok(attempt);
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    Err(PollTimeout { polls: max_polls })
}

/// Evaluate `f` until it returns `Ok(true)` or `timeout` elapses.
///
/// Errors returned by `f` abort the wait immediately.
pub fn poll_until<F>(timeout: Duration, interval: Duration, mut f: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    loop {
        if f()? {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            bail!("timed out after {:?}", timeout);
        }
        thread::sleep(interval);
    }
}
