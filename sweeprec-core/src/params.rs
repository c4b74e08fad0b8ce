//! Run parameters and the validation gate that produces them.
//!
//! Raw command-line values go in as [`RunArgs`]; the only way to obtain a
//! [`RunParameters`] is [`RunParameters::validate`], so every value of that
//! type satisfies all checks below.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. temperature parses as a float (`.` as decimal separator)
//! 2. label is one of [`Label`], ignoring case
//! 3. output path does not exist yet
//! 4. output extension names an allowed [`RecordFormat`]
//! 5. frame limit, when given, is at least one

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::ValidationError;

/// Surface class under the sensor during a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Label {
    Snow,
    Wet,
    Ice,
    Dry,
    Metal,
}

impl Label {
    /// Comma separated list of all accepted labels
    pub fn valid_list() -> String {
        Label::iter()
            .map(|l| l.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Serialization formats a recording can be saved as, keyed by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RecordFormat {
    /// HDF5 container (`.h5`)
    H5,
    /// NumPy zipped archive (`.npz`)
    Npz,
}

impl RecordFormat {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::H5 => ".h5",
            RecordFormat::Npz => ".npz",
        }
    }

    /// Look up a format by its extension, with or without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        RecordFormat::iter().find(|f| f.as_ref() == ext)
    }

    /// Format selected by the extension of `path`
    pub fn of_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Unvalidated arguments, as they come off the command line.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub temperature: String,
    pub label: String,
    pub output: PathBuf,
    pub frame_limit: Option<i64>,
    pub angle: String,
    pub distance: String,
}

/// A fully validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    temperature: f64,
    label: Label,
    output: PathBuf,
    format: RecordFormat,
    frame_limit: Option<NonZeroU64>,
    angle: String,
    distance: String,
}

impl RunParameters {
    /// Validate raw arguments against the formats this build can write.
    ///
    /// Reads file-system metadata for the existence check; nothing is
    /// created or modified.
    pub fn validate(args: RunArgs, formats: &[RecordFormat]) -> Result<Self, ValidationError> {
        let temperature = parse_temperature(&args.temperature)?;

        let label = args
            .label
            .parse::<Label>()
            .map_err(|_| ValidationError::InvalidLabel {
                value: args.label.clone(),
            })?;

        if args.output.exists() {
            return Err(ValidationError::OutputAlreadyExists { path: args.output });
        }

        let format = RecordFormat::of_path(&args.output)
            .filter(|f| formats.contains(f))
            .ok_or_else(|| ValidationError::UnsupportedExtension {
                ext: extension_of(&args.output),
            })?;

        let frame_limit = match args.frame_limit {
            None => None,
            Some(value) => Some(
                u64::try_from(value)
                    .ok()
                    .and_then(NonZeroU64::new)
                    .ok_or(ValidationError::InvalidFrameLimit { value })?,
            ),
        };

        Ok(Self {
            temperature,
            label,
            output: args.output,
            format,
            frame_limit,
            angle: args.angle,
            distance: args.distance,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn frame_limit(&self) -> Option<NonZeroU64> {
        self.frame_limit
    }

    pub fn angle(&self) -> &str {
        &self.angle
    }

    pub fn distance(&self) -> &str {
        &self.distance
    }
}

fn parse_temperature(value: &str) -> Result<f64, ValidationError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| ValidationError::InvalidTemperature {
            value: value.to_owned(),
        })
}

/// Extension with leading dot as the user typed it, empty when missing
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ALL: &[RecordFormat] = &[RecordFormat::H5, RecordFormat::Npz];

    fn args(dir: &Path) -> RunArgs {
        RunArgs {
            temperature: "-3.5".to_string(),
            label: "Snow".to_string(),
            output: dir.join("session.npz"),
            frame_limit: None,
            angle: "45".to_string(),
            distance: "0.5".to_string(),
        }
    }

    #[test]
    fn test_valid_arguments() {
        let dir = tempdir().unwrap();
        let params = RunParameters::validate(args(dir.path()), ALL).unwrap();

        assert_eq!(params.temperature(), -3.5);
        assert_eq!(params.label(), Label::Snow);
        assert_eq!(params.format(), RecordFormat::Npz);
        assert_eq!(params.frame_limit(), None);
        assert_eq!(params.angle(), "45");
        assert_eq!(params.distance(), "0.5");
    }

    #[test]
    fn test_temperature_rejected() {
        let dir = tempdir().unwrap();
        for bad in ["2,5", "warm", "", "1.2.3", "NaN", "inf"] {
            let mut a = args(dir.path());
            a.temperature = bad.to_string();
            assert_eq!(
                RunParameters::validate(a, ALL),
                Err(ValidationError::InvalidTemperature {
                    value: bad.to_string()
                }),
                "temperature {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_temperature_forms() {
        let dir = tempdir().unwrap();
        for (raw, expected) in [("20", 20.0), (" 1.25 ", 1.25), ("1e1", 10.0), ("-0.5", -0.5)] {
            let mut a = args(dir.path());
            a.temperature = raw.to_string();
            let params = RunParameters::validate(a, ALL).unwrap();
            assert_eq!(params.temperature(), expected);
        }
    }

    #[test]
    fn test_label_case_insensitive() {
        let dir = tempdir().unwrap();
        for raw in ["snow", "WET", "Ice", "dRy", "METAL"] {
            let mut a = args(dir.path());
            a.label = raw.to_string();
            let params = RunParameters::validate(a, ALL).unwrap();
            assert_eq!(params.label().to_string(), raw.to_lowercase());
        }
    }

    #[test]
    fn test_label_rejected() {
        let dir = tempdir().unwrap();
        for bad in ["gravel", "", "snowy", " snow"] {
            let mut a = args(dir.path());
            a.label = bad.to_string();
            let err = RunParameters::validate(a, ALL).unwrap_err();
            assert_eq!(
                err,
                ValidationError::InvalidLabel {
                    value: bad.to_string()
                }
            );
            assert!(err.to_string().contains("snow, wet, ice, dry, metal"));
        }
    }

    #[test]
    fn test_existing_output_rejected() {
        let dir = tempdir().unwrap();
        for name in ["taken.npz", "taken.h5", "taken.csv"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"").unwrap();

            let mut a = args(dir.path());
            a.output = path.clone();
            assert_eq!(
                RunParameters::validate(a, ALL),
                Err(ValidationError::OutputAlreadyExists { path })
            );
        }
    }

    #[test]
    fn test_validation_leaves_filesystem_alone() {
        let dir = tempdir().unwrap();
        let mut a = args(dir.path());
        a.temperature = "abc".to_string();
        assert!(RunParameters::validate(a.clone(), ALL).is_err());
        assert!(!a.output.exists());

        a.temperature = "1.0".to_string();
        assert!(RunParameters::validate(a.clone(), ALL).is_ok());
        assert!(!a.output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extension_allow_list() {
        let dir = tempdir().unwrap();

        let mut a = args(dir.path());
        a.output = dir.path().join("out.csv");
        assert_eq!(
            RunParameters::validate(a, ALL),
            Err(ValidationError::UnsupportedExtension {
                ext: ".csv".to_string()
            })
        );

        let mut a = args(dir.path());
        a.output = dir.path().join("no_extension");
        assert_eq!(
            RunParameters::validate(a, ALL),
            Err(ValidationError::UnsupportedExtension { ext: String::new() })
        );

        let mut a = args(dir.path());
        a.output = dir.path().join("OUT.NPZ");
        assert_eq!(
            RunParameters::validate(a, ALL).unwrap().format(),
            RecordFormat::Npz
        );

        // Recognised, but not in the list this caller can write
        let mut a = args(dir.path());
        a.output = dir.path().join("out.h5");
        assert_eq!(
            RunParameters::validate(a, &[RecordFormat::Npz]),
            Err(ValidationError::UnsupportedExtension {
                ext: ".h5".to_string()
            })
        );
    }

    #[test]
    fn test_frame_limit() {
        let dir = tempdir().unwrap();
        for bad in [0, -1, i64::MIN] {
            let mut a = args(dir.path());
            a.frame_limit = Some(bad);
            assert_eq!(
                RunParameters::validate(a, ALL),
                Err(ValidationError::InvalidFrameLimit { value: bad })
            );
        }

        let mut a = args(dir.path());
        a.frame_limit = Some(1);
        let params = RunParameters::validate(a, ALL).unwrap();
        assert_eq!(params.frame_limit(), NonZeroU64::new(1));
    }

    #[test]
    fn test_first_failure_wins() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("exists.csv");
        std::fs::write(&existing, b"").unwrap();

        let a = RunArgs {
            temperature: "1,5".to_string(),
            label: "mud".to_string(),
            output: existing.clone(),
            frame_limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            RunParameters::validate(a.clone(), ALL),
            Err(ValidationError::InvalidTemperature { .. })
        ));

        let a = RunArgs {
            temperature: "1.5".to_string(),
            ..a
        };
        assert!(matches!(
            RunParameters::validate(a.clone(), ALL),
            Err(ValidationError::InvalidLabel { .. })
        ));

        let a = RunArgs {
            label: "ice".to_string(),
            ..a
        };
        assert!(matches!(
            RunParameters::validate(a.clone(), ALL),
            Err(ValidationError::OutputAlreadyExists { .. })
        ));

        let a = RunArgs {
            output: dir.path().join("fresh.csv"),
            ..a
        };
        assert!(matches!(
            RunParameters::validate(a.clone(), ALL),
            Err(ValidationError::UnsupportedExtension { .. })
        ));

        let a = RunArgs {
            output: dir.path().join("fresh.npz"),
            ..a
        };
        assert!(matches!(
            RunParameters::validate(a, ALL),
            Err(ValidationError::InvalidFrameLimit { value: 0 })
        ));
    }

    #[test]
    fn test_record_format_lookup() {
        assert_eq!(RecordFormat::from_extension(".npz"), Some(RecordFormat::Npz));
        assert_eq!(RecordFormat::from_extension("H5"), Some(RecordFormat::H5));
        assert_eq!(RecordFormat::from_extension(".csv"), None);
        assert_eq!(RecordFormat::Npz.extension(), ".npz");
        assert_eq!(
            RecordFormat::of_path(Path::new("a/b.Npz")),
            Some(RecordFormat::Npz)
        );
    }
}
