//! NumPy `.npz` archives.
//!
//! An `.npz` file is a ZIP archive with one deflated `.npy` member per array,
//! named `<key>.npy`. Members are written with zip64 headers so sessions
//! larger than 4 GiB still load with `numpy.load`.

use std::io::{Cursor, Read, Seek, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::RecordError;

/// Member file name for an array key
pub fn member_name(key: &str) -> String {
    format!("{}.npy", key)
}

/// Streaming `.npz` writer.
pub struct NpzWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek> NpzWriter<W> {
    /// Start an archive whose members carry `modified` as timestamp
    pub fn new(out: W, modified: NaiveDateTime) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(true)
            .last_modified_time(zip_timestamp(modified));
        Self {
            zip: ZipWriter::new(out),
            options,
        }
    }

    /// Add one `.npy` encoded array under `key`
    pub fn add(&mut self, key: &str, npy: &[u8]) -> Result<(), RecordError> {
        let name = member_name(key);
        self.zip.start_file(name.as_str(), self.options)?;
        self.zip.write_all(npy)?;
        debug!("npz member {}: {} bytes", name, npy.len());
        Ok(())
    }

    /// Write the central directory and return the underlying writer
    pub fn finish(self) -> Result<W, RecordError> {
        Ok(self.zip.finish()?)
    }
}

/// Read every member of an archive, in directory order, as `(key, npy bytes)`
pub fn read_archive(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, RecordError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;

        let name = file.name();
        let key = name.strip_suffix(".npy").unwrap_or(name).to_string();
        members.push((key, data));
    }
    Ok(members)
}

/// ZIP timestamps start in 1980; earlier times fall back to the epoch
fn zip_timestamp(t: NaiveDateTime) -> zip::DateTime {
    u16::try_from(t.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                t.month() as u8,
                t.day() as u8,
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}
