//! Emulated sensor producing synthetic IQ sweeps.
//!
//! Each sensor sees one reflector in the middle of the configured range. Its
//! phase moves a little every frame, so consecutive frames differ while the
//! output stays fully deterministic. Frames are paced to `update_rate` when
//! one is configured.

use std::f32::consts::PI;
use std::time::{Duration, Instant};

use log::debug;
use ndarray::Array2;
use num_complex::Complex32;
use sweeprec_core::FrameSource;

use super::Client;
use crate::error::ClientError;
use crate::sensor::{DataInfo, Frame, SensorConfig, SensorDataInfo, SessionInfo};

/// Distance between two depth points
pub const STEP_LENGTH_M: f64 = 0.48e-3;

/// Radar wavelength at 60 GHz
const WAVELENGTH_M: f32 = 5.0e-3;

/// Width of the emulated reflection
const REFLECTOR_WIDTH_M: f32 = 0.02;

const REFLECTOR_AMPLITUDE: f32 = 1000.0;
const NOISE_FLOOR: f32 = 10.0;

/// Phase change per frame, per sensor index
const PHASE_DRIFT: f32 = 0.05;

#[derive(Debug, Clone)]
struct EmulatedSession {
    config: SensorConfig,
    info: SessionInfo,
    period: Option<Duration>,
}

/// Client that needs no hardware.
#[derive(Debug, Default)]
pub struct EmulatedClient {
    session: Option<EmulatedSession>,
    streaming: bool,
    sequence: u32,
    next_due: Option<Instant>,
}

impl EmulatedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(&self, session: &EmulatedSession) -> Frame {
        let info = &session.info;
        let target = (info.range_start_m + info.range_length_m / 2.0) as f32;
        let start = info.range_start_m as f32;
        let step = info.step_length_m as f32;
        let sequence = self.sequence as f32;

        Array2::from_shape_fn(
            (session.config.sensors.len(), info.data_length),
            |(sensor, depth)| {
                let distance = start + depth as f32 * step;
                let offset = (distance - target) / REFLECTOR_WIDTH_M;
                let amplitude = REFLECTOR_AMPLITUDE * (-offset * offset).exp() + NOISE_FLOOR;
                let phase = 4.0 * PI * distance / WAVELENGTH_M
                    + sequence * PHASE_DRIFT * (sensor as f32 + 1.0);
                Complex32::from_polar(amplitude, phase)
            },
        )
    }

    /// Sleep until the next frame is due
    fn pace(&mut self, period: Duration) {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            std::thread::sleep(due.saturating_duration_since(now));
        }
        let base = self.next_due.map_or(now, |due| due.max(now));
        self.next_due = Some(base + period);
    }
}

impl FrameSource for EmulatedClient {
    type Info = DataInfo;
    type Frame = Frame;
    type Error = ClientError;

    fn get_next(&mut self) -> Result<(DataInfo, Frame), ClientError> {
        let session = match (&self.session, self.streaming) {
            (Some(session), true) => session.clone(),
            _ => {
                return Err(ClientError::Protocol(
                    "get_next called before start_session".to_string(),
                ))
            }
        };

        if let Some(period) = session.period {
            self.pace(period);
        }

        let frame = self.sweep(&session);
        let info = session
            .config
            .sensors
            .iter()
            .map(|_| SensorDataInfo {
                sequence_number: self.sequence,
                missed_data: false,
                data_saturated: false,
            })
            .collect();
        self.sequence = self.sequence.wrapping_add(1);

        Ok((info, frame))
    }
}

impl Client for EmulatedClient {
    fn setup_session(&mut self, config: &SensorConfig) -> Result<SessionInfo, ClientError> {
        if self.streaming {
            return Err(ClientError::Protocol(
                "setup_session called while streaming".to_string(),
            ));
        }
        config.validate()?;
        let period = config.update_period()?;

        let data_length = ((config.range_length() / STEP_LENGTH_M).round() as usize).max(1);
        let info = SessionInfo {
            data_length,
            range_start_m: config.range_start(),
            range_length_m: data_length as f64 * STEP_LENGTH_M,
            step_length_m: STEP_LENGTH_M,
        };
        debug!("Emulated session {:?}", info);

        self.session = Some(EmulatedSession {
            config: config.clone(),
            info: info.clone(),
            period,
        });
        Ok(info)
    }

    fn start_session(&mut self) -> Result<(), ClientError> {
        if self.session.is_none() {
            return Err(ClientError::Protocol(
                "start_session called before setup_session".to_string(),
            ));
        }
        self.streaming = true;
        self.sequence = 0;
        self.next_due = None;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ClientError> {
        self.streaming = false;
        self.session = None;
        Ok(())
    }
}
