//! Error types for clients, recordings and the command-line tools

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use sweeprec_core::{RecordFormat, ValidationError};
use thiserror::Error;

/// Failures talking to a sensor client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Link message could not be encoded or decoded
    #[error("Link codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Link message of {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    /// Reply or call did not fit the session state
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reported by the sensor side
    #[error("Sensor reported: {0}")]
    Remote(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("{0} transport is not supported on this platform")]
    Unsupported(&'static str),

    #[error("No serial port found, use --uart to name one")]
    NoSerialPort,

    #[error("Invalid sensor configuration: {0}")]
    InvalidConfig(String),
}

/// Failures saving or reading a recording
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("File '{}' already exists, won't overwrite", .0.display())]
    AlreadyExists(PathBuf),

    #[error("No record format for '{}'", .0.display())]
    UnknownFormat(PathBuf),

    #[error("{} output is not available in this build", .0.extension())]
    FormatUnavailable(RecordFormat),

    #[error("Frame {index} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Malformed array: {0}")]
    Malformed(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top level error of the command-line tools
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(
        code(sweeprec::invalid_argument),
        help("no device was contacted and no file was written")
    )]
    Validation(#[from] ValidationError),

    #[error("Transport failure")]
    #[diagnostic(code(sweeprec::transport))]
    Transport(#[from] ClientError),

    #[error("Failed to save recording")]
    #[diagnostic(code(sweeprec::record))]
    Record(#[from] RecordError),

    #[error("Failed to install interrupt handler")]
    #[diagnostic(code(sweeprec::interrupt))]
    Interrupt(#[source] io::Error),
}
