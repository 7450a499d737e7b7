//! Platform temperature components via `sysinfo`.

use sysinfo::Components;
use tempwatch_core::{SensorError, SensorSample};

use super::{LabelFilter, Sensor};

/// Reads every hardware component `sysinfo` exposes, keeping those whose
/// label passes the filter.
pub struct ComponentSensor {
    components: Components,
    filter: LabelFilter,
}

impl ComponentSensor {
    pub fn new(filter: LabelFilter) -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
            filter,
        }
    }
}

impl Sensor for ComponentSensor {
    fn name(&self) -> &str {
        "sysinfo-components"
    }

    fn read(&mut self) -> Result<Vec<SensorSample>, SensorError> {
        self.components.refresh(true);

        let samples: Vec<SensorSample> = self
            .components
            .iter()
            .filter(|comp| self.filter.matches(comp.label()))
            .filter_map(|comp| {
                comp.temperature()
                    .map(|celsius| SensorSample::new(comp.label(), celsius))
            })
            .collect();

        if samples.is_empty() {
            return Err(self.filter.nothing_matched("component"));
        }

        Ok(samples)
    }
}
