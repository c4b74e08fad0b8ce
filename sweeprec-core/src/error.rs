//! Error types for run parameter validation

use std::path::PathBuf;

use thiserror::Error;

use crate::params::Label;

/// Reasons a set of run arguments is rejected.
///
/// Validation stops at the first failure, so exactly one of these is
/// reported per run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Temperature is not a number written with `.` as decimal separator
    #[error("Temp value '{value}' not a float. Make sure you use . instead of , !")]
    InvalidTemperature { value: String },

    /// Label is not one of the known surface classes
    #[error("Not a valid label: '{value}'. Only {} are accepted labels!", Label::valid_list())]
    InvalidLabel { value: String },

    /// Output file is already there and would be overwritten
    #[error("File '{}' already exists, won't overwrite", .path.display())]
    OutputAlreadyExists { path: PathBuf },

    /// Output file extension does not name a format this build can write
    #[error("Unknown format '{ext}'")]
    UnsupportedExtension { ext: String },

    /// Frame limit below one
    #[error("Frame limit must be at least 1, got {value}")]
    InvalidFrameLimit { value: i64 },
}
