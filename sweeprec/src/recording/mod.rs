//! Recording of sampled sessions.
//!
//! A [`Recorder`] is the frame sink of `record-data`. It keeps every frame in
//! memory until the session ends, is closed into a [`Record`], and the record
//! is written with [`save`].
//!
//! ```text
//! sample_session ──► Recorder::sample() ──► close() ──► Record ──► save(path)
//!                                                                    │
//!                                                  .npz ◄── npz + npy┤
//!                                                  .h5  ◄── h5 ──────┘
//! ```
//!
//! `.h5` output needs the `hdf5` cargo feature and a system HDF5 library.
//!
//! # Members
//!
//! | Member               | Type                                          |
//! |----------------------|-----------------------------------------------|
//! | `data`               | complex64, `(frames, sensors, data_length)`   |
//! | `data_info`          | JSON text, one list of sensor infos per frame |
//! | `sensor_config_dump` | JSON text                                     |
//! | `session_info`       | JSON text                                     |
//! | `mode`               | text, always `iq`                             |
//! | `label`              | text                                          |
//! | `angle`, `distance`  | text, as given on the command line            |
//! | `timestamp`          | text, RFC 3339 session start                  |
//! | `lib_version`        | text                                          |
//! | `temperature`        | float64                                       |

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use sweeprec_core::{FrameSink, Label, RecordFormat, RunParameters};

use crate::error::RecordError;
use crate::sensor::{DataInfo, Frame, SensorConfig, SessionInfo};

#[cfg(feature = "hdf5")]
pub mod h5;
pub mod npy;
pub mod npz;

/// Formats this build can write; handed to the validation gate
#[cfg(feature = "hdf5")]
pub const SUPPORTED_FORMATS: &[RecordFormat] = &[RecordFormat::H5, RecordFormat::Npz];

/// Formats this build can write; handed to the validation gate
#[cfg(not(feature = "hdf5"))]
pub const SUPPORTED_FORMATS: &[RecordFormat] = &[RecordFormat::Npz];

/// Service mode stored with every recording
pub const MODE: &str = "iq";

/// Operator supplied description of the recorded scene
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    pub temperature: f64,
    pub label: Label,
    pub angle: String,
    pub distance: String,
}

impl RecordMetadata {
    pub fn from_params(params: &RunParameters) -> Self {
        Self {
            temperature: params.temperature(),
            label: params.label(),
            angle: params.angle().to_string(),
            distance: params.distance().to_string(),
        }
    }
}

/// A finished recording, ready to be saved
#[derive(Debug, Clone)]
pub struct Record {
    pub mode: String,
    pub sensor_config: SensorConfig,
    pub session_info: SessionInfo,
    /// Frames in retrieval order
    pub data: Vec<Frame>,
    /// Frame metadata, index aligned with `data`
    pub data_info: Vec<DataInfo>,
    pub metadata: RecordMetadata,
    /// Session start
    pub timestamp: DateTime<Local>,
    pub lib_version: String,
}

impl Record {
    pub fn frame_count(&self) -> usize {
        self.data.len()
    }

    /// Shape every frame must have
    pub fn frame_shape(&self) -> (usize, usize) {
        (
            self.sensor_config.sensors.len(),
            self.session_info.data_length,
        )
    }

    fn check_shapes(&self) -> Result<(), RecordError> {
        let expected = self.frame_shape();
        match self
            .data
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.dim() != expected)
        {
            Some((index, frame)) => Err(RecordError::ShapeMismatch {
                index,
                expected,
                actual: frame.dim(),
            }),
            None => Ok(()),
        }
    }
}

/// Frame sink buffering a session in memory.
pub struct Recorder {
    record: Record,
}

impl Recorder {
    pub fn new(
        sensor_config: SensorConfig,
        session_info: SessionInfo,
        metadata: RecordMetadata,
    ) -> Self {
        debug!(
            "Recorder for sensors {:?}, {} points per sweep",
            sensor_config.sensors, session_info.data_length
        );
        Self {
            record: Record {
                mode: MODE.to_string(),
                sensor_config,
                session_info,
                data: Vec::new(),
                data_info: Vec::new(),
                metadata,
                timestamp: Local::now(),
                lib_version: crate::VERSION.to_string(),
            },
        }
    }

    pub fn frame_count(&self) -> usize {
        self.record.data.len()
    }

    /// Stop recording and hand over the collected frames
    pub fn close(self) -> Record {
        debug!("Recorder closed with {} frames", self.record.data.len());
        self.record
    }
}

impl FrameSink<DataInfo, Frame> for Recorder {
    fn sample(&mut self, info: DataInfo, frame: Frame) {
        self.record.data_info.push(info);
        self.record.data.push(frame);
    }
}

/// Write `record` to `path`, in the format named by its extension.
///
/// The file is created exclusively: an existing file is never replaced,
/// even one that appeared while the session was running. A partially
/// written file is removed again on failure.
pub fn save(path: &Path, record: &Record) -> Result<(), RecordError> {
    let format =
        RecordFormat::of_path(path).ok_or_else(|| RecordError::UnknownFormat(path.to_path_buf()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(RecordError::FormatUnavailable(format));
    }
    record.check_shapes()?;

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => RecordError::AlreadyExists(path.to_path_buf()),
            _ => RecordError::Io(e),
        })?;

    let result = match format {
        RecordFormat::Npz => write_npz(BufWriter::new(file), record),
        #[cfg(feature = "hdf5")]
        RecordFormat::H5 => {
            drop(file);
            h5::write(path, record)
        }
        #[cfg(not(feature = "hdf5"))]
        RecordFormat::H5 => Err(RecordError::FormatUnavailable(format)),
    };

    match result {
        Ok(()) => {
            info!(
                "Saved {} frames to {}",
                record.frame_count(),
                path.display()
            );
            Ok(())
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(path) {
                warn!("Cannot remove incomplete {}: {}", path.display(), rm);
            }
            Err(e)
        }
    }
}

fn write_npz(out: BufWriter<File>, record: &Record) -> Result<(), RecordError> {
    let (sensors, data_length) = record.frame_shape();
    let mut archive = npz::NpzWriter::new(out, record.timestamp.naive_local());

    let data = npy::complex64_array(
        &[record.frame_count(), sensors, data_length],
        record.data.iter().flat_map(|frame| frame.iter()),
    );
    archive.add("data", &data)?;
    archive.add(
        "data_info",
        &npy::unicode_scalar(&serde_json::to_string(&record.data_info)?),
    )?;
    archive.add(
        "sensor_config_dump",
        &npy::unicode_scalar(&serde_json::to_string(&record.sensor_config)?),
    )?;
    archive.add(
        "session_info",
        &npy::unicode_scalar(&serde_json::to_string(&record.session_info)?),
    )?;
    archive.add("mode", &npy::unicode_scalar(&record.mode))?;
    archive.add("label", &npy::unicode_scalar(record.metadata.label.as_ref()))?;
    archive.add("angle", &npy::unicode_scalar(&record.metadata.angle))?;
    archive.add("distance", &npy::unicode_scalar(&record.metadata.distance))?;
    archive.add(
        "timestamp",
        &npy::unicode_scalar(&record.timestamp.to_rfc3339()),
    )?;
    archive.add("lib_version", &npy::unicode_scalar(&record.lib_version))?;
    archive.add(
        "temperature",
        &npy::float64_scalar(record.metadata.temperature),
    )?;

    let mut out = archive.finish()?;
    out.flush()?;
    Ok(())
}
