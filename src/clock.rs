// SPDX-License-Identifier: MIT
//! Wall-clock time and sleeping, behind a trait so the loop can be driven
//! without real waits.
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of UTC time and of the delay between iterations.
pub trait Clock {
    /// Current wall-clock time in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The real clock: `chrono::Utc::now` and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
