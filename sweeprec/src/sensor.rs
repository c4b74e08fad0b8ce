//! Sensor configuration and the data it produces.

use std::time::Duration;

use ndarray::Array2;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Sensor used when none is given on the command line
pub const DEFAULT_SENSOR: u8 = 1;

/// One sweep of complex IQ samples, shaped `(sensors, data_length)`
pub type Frame = Array2<Complex32>;

/// Per-frame metadata, one entry per active sensor
pub type DataInfo = Vec<SensorDataInfo>;

/// Status reported by one sensor for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDataInfo {
    pub sequence_number: u32,
    pub missed_data: bool,
    pub data_saturated: bool,
}

/// IQ service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor ids to sweep, in frame row order
    pub sensors: Vec<u8>,
    /// Frames per second; `None` lets the sensor run as fast as it can
    pub update_rate: Option<f64>,
    /// Measured range `[start, end]` in metres
    pub range_interval: [f64; 2],
}

impl SensorConfig {
    /// Settings used by `record-data`
    pub fn for_recording() -> Self {
        Self {
            sensors: vec![DEFAULT_SENSOR],
            update_rate: Some(150.0),
            range_interval: [0.15, 2.0],
        }
    }

    /// Settings used by `test-throughput`
    pub fn for_throughput() -> Self {
        Self {
            sensors: vec![DEFAULT_SENSOR],
            update_rate: Some(50.0),
            range_interval: [0.2, 0.6],
        }
    }

    pub fn range_start(&self) -> f64 {
        self.range_interval[0]
    }

    pub fn range_end(&self) -> f64 {
        self.range_interval[1]
    }

    pub fn range_length(&self) -> f64 {
        self.range_end() - self.range_start()
    }

    /// Time between two frames, `None` when unpaced
    pub fn update_period(&self) -> Result<Option<Duration>, ClientError> {
        let Some(rate) = self.update_rate else {
            return Ok(None);
        };
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ClientError::InvalidConfig(format!(
                "update rate must be positive, got {}",
                rate
            )));
        }
        Duration::try_from_secs_f64(1.0 / rate)
            .map(Some)
            .map_err(|_| ClientError::InvalidConfig(format!("update rate {} Hz is too low", rate)))
    }

    /// Check the configuration before it is sent to a sensor
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.sensors.is_empty() {
            return Err(ClientError::InvalidConfig(
                "at least one sensor is required".to_string(),
            ));
        }
        self.update_period()?;
        let [start, end] = self.range_interval;
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return Err(ClientError::InvalidConfig(format!(
                "range interval [{}, {}] must satisfy 0 <= start < end",
                start, end
            )));
        }
        Ok(())
    }
}

/// Session parameters reported back by the sensor after setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Number of depth points per sensor in each frame
    pub data_length: usize,
    pub range_start_m: f64,
    pub range_length_m: f64,
    /// Distance between two depth points
    pub step_length_m: f64,
}
