//! Hardware sensor probes for SensorWatch agents
//!
//! Provides best-effort readings:
//! - CPU temperature from the platform thermal sensors (sysinfo components)
//! - GPU temperature from NVML when built with the `nvml` feature
//! - Memory usage (GB rounded to 2 decimals, percent to 1)
//!
//! Probes are selected once at startup. A probe that is unsupported on this
//! host, or fails on a given read, yields `None`; it never aborts a cycle.

use sysinfo::{Components, System};
use tracing::{debug, info};

use crate::reading::MemoryInfo;

#[cfg(feature = "nvml")]
mod nvml;

/// Chip-name prefixes tried in order before falling back to any sensor
const CPU_SENSOR_PRIORITY: &[&str] = &["coretemp", "cpu_thermal", "k10temp"];

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub trait TemperatureProbe: Send {
    fn name(&self) -> &'static str;
    fn read_celsius(&mut self) -> Option<f64>;
}

pub trait MemoryProbe: Send {
    fn read(&mut self) -> Option<MemoryInfo>;
}

/// Values from one pass over all probes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSample {
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub memory_usage: Option<MemoryInfo>,
}

pub struct SensorSuite {
    cpu: Box<dyn TemperatureProbe>,
    gpu: Box<dyn TemperatureProbe>,
    memory: Box<dyn MemoryProbe>,
}

impl SensorSuite {
    pub fn new(
        cpu: Box<dyn TemperatureProbe>,
        gpu: Box<dyn TemperatureProbe>,
        memory: Box<dyn MemoryProbe>,
    ) -> Self {
        Self { cpu, gpu, memory }
    }

    /// Pick the best available probe for each sensor on this host
    pub fn detect() -> Self {
        let cpu: Box<dyn TemperatureProbe> = Box::new(SysinfoCpuProbe::new());
        let gpu = detect_gpu_probe();
        info!("Sensor probes: cpu={}, gpu={}", cpu.name(), gpu.name());
        Self::new(cpu, gpu, Box::new(SysinfoMemoryProbe::new()))
    }

    pub fn sample(&mut self) -> SensorSample {
        let sample = SensorSample {
            cpu_temp: self.cpu.read_celsius(),
            gpu_temp: self.gpu.read_celsius(),
            memory_usage: self.memory.read(),
        };
        debug!("Sensor sample: {:?}", sample);
        sample
    }
}

#[cfg(feature = "nvml")]
fn detect_gpu_probe() -> Box<dyn TemperatureProbe> {
    match nvml::NvmlGpuProbe::init() {
        Some(probe) => Box::new(probe),
        None => Box::new(Unavailable),
    }
}

#[cfg(not(feature = "nvml"))]
fn detect_gpu_probe() -> Box<dyn TemperatureProbe> {
    Box::new(Unavailable)
}

/// Probe for a sensor this host cannot read
pub struct Unavailable;

impl TemperatureProbe for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn read_celsius(&mut self) -> Option<f64> {
        None
    }
}

pub struct SysinfoCpuProbe {
    components: Components,
}

impl SysinfoCpuProbe {
    pub fn new() -> Self {
        Self { components: Components::new_with_refreshed_list() }
    }
}

impl Default for SysinfoCpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureProbe for SysinfoCpuProbe {
    fn name(&self) -> &'static str {
        "sysinfo-components"
    }

    fn read_celsius(&mut self) -> Option<f64> {
        self.components.refresh();
        pick_cpu_temperature(self.components.iter().map(|c| (c.label(), c.temperature())))
    }
}

/// Preferred chip first, else the first sensor with a usable value
pub fn pick_cpu_temperature<'a>(sensors: impl IntoIterator<Item = (&'a str, f32)>) -> Option<f64> {
    let usable: Vec<(String, f32)> = sensors
        .into_iter()
        .filter(|(_, temp)| temp.is_finite())
        .map(|(label, temp)| (label.to_lowercase(), temp))
        .collect();

    CPU_SENSOR_PRIORITY
        .iter()
        .find_map(|chip| usable.iter().find(|(label, _)| label.contains(chip)))
        .or_else(|| usable.first())
        .map(|(_, temp)| round_to(f64::from(*temp), 1))
}

pub struct SysinfoMemoryProbe {
    sys: System,
}

impl SysinfoMemoryProbe {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn read(&mut self) -> Option<MemoryInfo> {
        self.sys.refresh_memory();
        memory_info(self.sys.total_memory(), self.sys.available_memory())
    }
}

/// Byte counters → rounded `MemoryInfo`; `None` when the total is unknown
pub fn memory_info(total_bytes: u64, available_bytes: u64) -> Option<MemoryInfo> {
    if total_bytes == 0 {
        return None;
    }
    let available_bytes = available_bytes.min(total_bytes);
    let used_bytes = total_bytes - available_bytes;
    let percent = used_bytes as f64 / total_bytes as f64 * 100.0;

    Some(MemoryInfo {
        total_gb: round_to(total_bytes as f64 / BYTES_PER_GB, 2),
        used_gb: round_to(used_bytes as f64 / BYTES_PER_GB, 2),
        available_gb: round_to(available_bytes as f64 / BYTES_PER_GB, 2),
        percent: round_to(percent, 1),
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
