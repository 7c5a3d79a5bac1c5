//! Periodic collect-and-deliver loop
//!
//! Each cycle samples the sensors, delivers one fresh reading with the
//! configured retry budget, then waits the collection interval whatever the
//! outcome. Nothing is queued: an undelivered reading is gone and the next
//! cycle sends a new one. Shutdown is honoured between cycles, before each
//! network attempt and during every wait.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::delivery::{shutdown_requested, DeliveryClient, DeliveryOutcome, Transport};
use crate::discovery::SystemInfo;
use crate::reading::{unix_seconds, Reading};
use crate::sensors::SensorSuite;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub delivered: u64,
    pub dropped: u64,
}

pub struct CollectionLoop<T, C> {
    system: SystemInfo,
    sensors: SensorSuite,
    client: DeliveryClient<T, C>,
    interval: Duration,
    stats: CycleStats,
}

impl<T: Transport, C: Clock> CollectionLoop<T, C> {
    pub fn new(system: SystemInfo, sensors: SensorSuite, client: DeliveryClient<T, C>, interval: Duration) -> Self {
        Self { system, sensors, client, interval, stats: CycleStats::default() }
    }

    pub fn build_reading(&mut self, at: DateTime<Utc>) -> Reading {
        let sample = self.sensors.sample();
        Reading {
            hostname: self.system.hostname.clone(),
            os: self.system.os.clone(),
            timestamp: unix_seconds(at),
            cpu_temp: sample.cpu_temp,
            gpu_temp: sample.gpu_temp,
            memory_usage: sample.memory_usage,
        }
    }

    /// One collect + deliver pass
    pub async fn run_cycle(&mut self) -> DeliveryOutcome {
        let reading = self.build_reading(Utc::now());
        let outcome = self.client.deliver_outcome(&reading).await;
        match outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.stats.cycles += 1;
                self.stats.delivered += 1;
            }
            DeliveryOutcome::Exhausted { .. } => {
                self.stats.cycles += 1;
                self.stats.dropped += 1;
            }
            DeliveryOutcome::Cancelled { .. } => {}
        }
        outcome
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Runs until `shutdown` turns `true` (or its sender is dropped)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CycleStats {
        info!(
            "Collection loop started for {} ({}), interval {:?}",
            self.system.hostname, self.system.os, self.interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let DeliveryOutcome::Cancelled { .. } = self.run_cycle().await {
                break;
            }
            debug!("Cycle {} done: {:?}", self.stats.cycles, self.stats);
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.client.clock().sleep(self.interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!(
            "Collection loop stopped after {} cycles ({} delivered, {} dropped)",
            self.stats.cycles, self.stats.delivered, self.stats.dropped
        );
        self.stats
    }
}
