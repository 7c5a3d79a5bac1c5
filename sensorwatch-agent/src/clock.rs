//! Timer abstraction behind every wait the agent performs
//!
//! Production code sleeps on the tokio timer; tests inject [`ManualClock`]
//! to observe the requested delays without waiting for them.

use std::future::Future;
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
pub use manual::ManualClock;
