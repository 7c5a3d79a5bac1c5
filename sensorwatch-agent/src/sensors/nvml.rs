//! NVIDIA GPU temperature through NVML (first device only)

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use tracing::{debug, info};

use super::TemperatureProbe;

pub struct NvmlGpuProbe {
    nvml: Nvml,
}

impl NvmlGpuProbe {
    /// `None` when the driver is missing or no device is present
    pub fn init() -> Option<Self> {
        match Nvml::init() {
            Ok(nvml) => match nvml.device_count() {
                Ok(count) if count > 0 => {
                    info!("NVML initialised with {count} device(s)");
                    Some(Self { nvml })
                }
                _ => {
                    debug!("NVML reports no GPU devices");
                    None
                }
            },
            Err(e) => {
                debug!("NVML unavailable: {e}");
                None
            }
        }
    }
}

impl TemperatureProbe for NvmlGpuProbe {
    fn name(&self) -> &'static str {
        "nvml"
    }

    fn read_celsius(&mut self) -> Option<f64> {
        let device = self.nvml.device_by_index(0).ok()?;
        device.temperature(TemperatureSensor::Gpu).ok().map(f64::from)
    }
}
