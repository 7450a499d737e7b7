//! NVIDIA GPU temperatures through NVML.

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use tempwatch_core::{SensorError, SensorSample};

use super::{LabelFilter, Sensor};

/// Reads the core temperature of every NVIDIA device whose name passes the
/// filter.
pub struct NvmlSensor {
    nvml: Nvml,
    filter: LabelFilter,
}

impl NvmlSensor {
    /// Initializes the NVML library.
    ///
    /// # Errors
    ///
    /// Returns `SensorError::Unavailable` if the driver is missing.
    pub fn init(filter: LabelFilter) -> Result<Self, SensorError> {
        let nvml = Nvml::init().map_err(|e| SensorError::Unavailable(e.to_string()))?;
        Ok(Self { nvml, filter })
    }
}

impl Sensor for NvmlSensor {
    fn name(&self) -> &str {
        "nvml"
    }

    fn read(&mut self) -> Result<Vec<SensorSample>, SensorError> {
        let count = self
            .nvml
            .device_count()
            .map_err(|e| SensorError::Driver(e.to_string()))?;

        let mut samples = Vec::new();
        for index in 0..count {
            let device = self
                .nvml
                .device_by_index(index)
                .map_err(|e| SensorError::Driver(format!("device {index}: {e}")))?;
            let label = device.name().unwrap_or_else(|_| format!("GPU {index}"));
            if !self.filter.matches(&label) {
                continue;
            }
            let celsius = device
                .temperature(TemperatureSensor::Gpu)
                .map_err(|e| SensorError::Driver(format!("{label}: {e}")))?;
            samples.push(SensorSample::new(label, celsius as f32));
        }

        if samples.is_empty() {
            return Err(self.filter.nothing_matched("GPU"));
        }

        Ok(samples)
    }
}
