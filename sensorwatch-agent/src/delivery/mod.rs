//! Reading delivery to the kernel
//!
//! One call to [`DeliveryClient::deliver`] is one logical delivery: up to
//! `max_retries` bounded attempts separated by a fixed `retry_delay`. The
//! retry loop is an explicit [`DeliveryState`] machine driven by an injected
//! [`Clock`], so tests can check exactly which waits happened.
//!
//! There is no local queue. A reading whose budget is exhausted is dropped.

mod http;

pub use http::HttpTransport;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::reading::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("attempt timed out")]
    Timeout,
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// One outbound send of a reading
pub trait Transport: Send + Sync {
    fn send(&self, reading: &Reading) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Attempt numbers are 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Attempting { attempt: u32 },
    Waiting { next_attempt: u32 },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl DeliveryState {
    pub fn start() -> Self {
        DeliveryState::Attempting { attempt: 1 }
    }

    pub fn on_attempt(self, succeeded: bool, max_retries: u32) -> Self {
        match self {
            DeliveryState::Attempting { attempt } if succeeded => {
                DeliveryState::Succeeded { attempts: attempt }
            }
            DeliveryState::Attempting { attempt } if attempt < max_retries => {
                DeliveryState::Waiting { next_attempt: attempt + 1 }
            }
            DeliveryState::Attempting { attempt } => DeliveryState::Exhausted { attempts: attempt },
            other => other,
        }
    }

    pub fn on_wait_elapsed(self) -> Self {
        match self {
            DeliveryState::Waiting { next_attempt } => {
                DeliveryState::Attempting { attempt: next_attempt }
            }
            other => other,
        }
    }

    pub fn on_cancel(self) -> Self {
        match self {
            DeliveryState::Attempting { attempt } => DeliveryState::Cancelled { attempts: attempt - 1 },
            DeliveryState::Waiting { next_attempt } => {
                DeliveryState::Cancelled { attempts: next_attempt - 1 }
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

pub struct DeliveryClient<T, C> {
    transport: T,
    clock: C,
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<T: Transport, C: Clock> DeliveryClient<T, C> {
    pub fn new(transport: T, clock: C, policy: RetryPolicy) -> Self {
        Self {
            transport,
            clock,
            policy: RetryPolicy { max_retries: policy.max_retries.max(1), ..policy },
            shutdown: None,
        }
    }

    /// Stop before the next attempt or during a retry wait once `true` is observed
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn deliver(&self, reading: &Reading) -> bool {
        self.deliver_outcome(reading).await.is_delivered()
    }

    pub async fn deliver_outcome(&self, reading: &Reading) -> DeliveryOutcome {
        let max = self.policy.max_retries;
        let mut shutdown = self.shutdown.clone();
        let mut state = DeliveryState::start();

        loop {
            state = match state {
                DeliveryState::Attempting { attempt } => {
                    if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                        state.on_cancel()
                    } else {
                        let result = self.attempt(reading).await;
                        match &result {
                            Ok(()) => info!("✓ Sent reading: {}", reading.summary()),
                            Err(e @ DeliveryError::Unexpected(_)) => {
                                warn!("✗ Unexpected error (attempt {attempt}/{max}): {e}")
                            }
                            Err(e) => warn!("✗ Send failed (attempt {attempt}/{max}): {e}"),
                        }
                        state.on_attempt(result.is_ok(), max)
                    }
                }
                DeliveryState::Waiting { .. } => match shutdown.as_mut() {
                    Some(rx) => tokio::select! {
                        _ = self.clock.sleep(self.policy.retry_delay) => state.on_wait_elapsed(),
                        _ = shutdown_requested(rx) => state.on_cancel(),
                    },
                    None => {
                        self.clock.sleep(self.policy.retry_delay).await;
                        state.on_wait_elapsed()
                    }
                },
                DeliveryState::Succeeded { attempts } => {
                    return DeliveryOutcome::Delivered { attempts };
                }
                DeliveryState::Exhausted { attempts } => {
                    warn!("Dropping reading after {attempts} failed attempts");
                    return DeliveryOutcome::Exhausted { attempts };
                }
                DeliveryState::Cancelled { attempts } => {
                    info!("Delivery cancelled after {attempts} attempts");
                    return DeliveryOutcome::Cancelled { attempts };
                }
            };
        }
    }

    async fn attempt(&self, reading: &Reading) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.policy.attempt_timeout, self.transport.send(reading)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout),
        }
    }
}

/// Resolves once shutdown is requested; a dropped sender counts as a request
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
