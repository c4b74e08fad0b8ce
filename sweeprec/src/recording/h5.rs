//! HDF5 output, built with the `hdf5` feature.
//!
//! Same members as the `.npz` archive, one dataset each. `data` is a
//! complex64 dataset shaped `(frames, sensors, data_length)`; text members
//! are scalar variable-length UTF-8 strings.

use std::path::Path;

use hdf5::types::VarLenUnicode;
use log::debug;
use num_complex::Complex32;

use super::Record;
use crate::error::RecordError;

fn text(file: &hdf5::File, key: &str, value: &str) -> Result<(), RecordError> {
    let value: VarLenUnicode = value
        .parse()
        .map_err(|e| RecordError::Malformed(format!("{} in '{}': {:?}", key, value, e)))?;
    file.new_dataset::<VarLenUnicode>()
        .shape(())
        .create(key)?
        .write_scalar(&value)?;
    Ok(())
}

/// Write `record` into a fresh HDF5 file at `path`, replacing its content
pub fn write(path: &Path, record: &Record) -> Result<(), RecordError> {
    let file = hdf5::File::create(path)?;
    let (sensors, data_length) = record.frame_shape();

    let data = file
        .new_dataset::<Complex32>()
        .shape([record.frame_count(), sensors, data_length])
        .create("data")?;
    let values: Vec<Complex32> = record
        .data
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .collect();
    if !values.is_empty() {
        data.write_raw(&values)?;
    }

    text(&file, "data_info", &serde_json::to_string(&record.data_info)?)?;
    text(
        &file,
        "sensor_config_dump",
        &serde_json::to_string(&record.sensor_config)?,
    )?;
    text(&file, "session_info", &serde_json::to_string(&record.session_info)?)?;
    text(&file, "mode", &record.mode)?;
    text(&file, "label", record.metadata.label.as_ref())?;
    text(&file, "angle", &record.metadata.angle)?;
    text(&file, "distance", &record.metadata.distance)?;
    text(&file, "timestamp", &record.timestamp.to_rfc3339())?;
    text(&file, "lib_version", &record.lib_version)?;
    file.new_dataset::<f64>()
        .shape(())
        .create("temperature")?
        .write_scalar(&record.metadata.temperature)?;

    file.flush()?;
    debug!("HDF5 file {} written", path.display());
    Ok(())
}
