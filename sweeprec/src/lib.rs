//! # Sweeprec
//!
//! Command-line tools for recording radar sweep sessions.
//!
//! - `record-data` records a labelled session of IQ sweeps to a `.npz` file,
//!   or `.h5` with the `hdf5` feature
//! - `test-throughput` counts how fast frames arrive over a connection
//!
//! ## Architecture
//!
//! The sampling loop, run parameters and their validation live in
//! [`sweeprec_core`]. This crate adds everything that touches the outside
//! world:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          sweeprec                            │
//! │  ┌───────────────┐ ┌─────────────────┐ ┌──────────────────┐  │
//! │  │ record-data   │ │ test-throughput │ │ interrupt        │  │
//! │  │ (clap)        │ │ (clap)          │ │ (tokio ctrl_c)   │  │
//! │  └───────┬───────┘ └────────┬────────┘ └──────────────────┘  │
//! │          ▼                  ▼                                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ run: record_session / measure_throughput               │  │
//! │  └───────┬──────────────────────────────┬─────────────────┘  │
//! │          ▼                              ▼                    │
//! │  ┌──────────────────────┐   ┌──────────────────────────────┐ │
//! │  │ client: link (TCP,   │   │ recording: Recorder, npz/h5  │ │
//! │  │ UART), emulator      │   │ throughput: counter          │ │
//! │  └──────────────────────┘   └──────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: Recording from the emulator
//!
//! ```rust,no_run
//! use sweeprec::client::{connect, Transport};
//! use sweeprec::recording::SUPPORTED_FORMATS;
//! use sweeprec::run::record_session;
//! use sweeprec::sensor::SensorConfig;
//! use sweeprec_core::{CancelToken, NoProgress, RunArgs, RunParameters};
//!
//! let params = RunParameters::validate(
//!     RunArgs {
//!         temperature: "-2".to_string(),
//!         label: "snow".to_string(),
//!         output: "snow.npz".into(),
//!         frame_limit: Some(100),
//!         ..Default::default()
//!     },
//!     SUPPORTED_FORMATS,
//! )?;
//!
//! let mut client = connect(&Transport::Emulator)?;
//! record_session(
//!     client.as_mut(),
//!     &params,
//!     &SensorConfig::for_recording(),
//!     &CancelToken::new(),
//!     &mut NoProgress,
//!     || Ok(()),
//! )?;
//! # Ok::<(), sweeprec::error::Error>(())
//! ```

use std::path::PathBuf;

use clap::Args;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod client;
pub mod error;
pub mod interrupt;
pub mod recording;
pub mod run;
pub mod sensor;
pub mod throughput;

use client::Transport;
use error::ClientError;
use sensor::SensorConfig;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connection and sensor flags shared by both tools
#[derive(Args, Clone, Debug, PartialEq)]
pub struct ClientArgs {
    /// Connect to a streaming server, `host` or `host:port`
    #[arg(short = 's', long = "socket", value_name = "ADDR", conflicts_with_all = ["spi", "serial_port", "emulator"])]
    pub socket_addr: Option<String>,

    /// Use the SPI bus
    #[arg(long, conflicts_with_all = ["serial_port", "emulator"])]
    pub spi: bool,

    /// Serial port; autodetected when no other transport is given
    #[arg(short = 'u', long = "uart", value_name = "PORT", conflicts_with = "emulator")]
    pub serial_port: Option<PathBuf>,

    /// Serial port speed
    #[arg(long, value_name = "BAUD", default_value_t = client::link::DEFAULT_BAUDRATE)]
    pub baudrate: u32,

    /// Use the built-in sensor emulator
    #[arg(long)]
    pub emulator: bool,

    /// Sensor ids to use
    #[arg(long = "sensor", value_name = "ID", num_args = 1.., default_values_t = [sensor::DEFAULT_SENSOR])]
    pub sensors: Vec<u8>,

    /// Frames per second, overriding the tool's default
    #[arg(long, value_name = "HZ")]
    pub update_rate: Option<f64>,

    /// Measured range in metres, overriding the tool's default
    #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
    pub range: Option<Vec<f64>>,
}

impl ClientArgs {
    /// Selected transport; a serial port is autodetected when none is named
    pub fn transport(&self) -> Result<Transport, ClientError> {
        if let Some(addr) = &self.socket_addr {
            Ok(Transport::Socket(addr.clone()))
        } else if self.spi {
            Ok(Transport::Spi)
        } else if self.emulator {
            Ok(Transport::Emulator)
        } else {
            let port = match &self.serial_port {
                Some(port) => port.clone(),
                None => client::autodetect_serial_port()?,
            };
            Ok(Transport::Uart {
                port,
                baudrate: self.baudrate,
            })
        }
    }

    /// Apply the flags on top of a tool's default configuration
    pub fn sensor_config(&self, defaults: SensorConfig) -> Result<SensorConfig, ClientError> {
        let mut config = defaults;
        if !self.sensors.is_empty() {
            config.sensors = self.sensors.clone();
        }
        if let Some(rate) = self.update_rate {
            config.update_rate = Some(rate);
        }
        if let Some(range) = &self.range {
            match range.as_slice() {
                [start, end] => config.range_interval = [*start, *end],
                _ => {
                    return Err(ClientError::InvalidConfig(
                        "--range takes a start and an end".to_string(),
                    ))
                }
            }
        }
        config.validate()?;
        Ok(config)
    }
}

/// Route `log` output to stderr at the level chosen with `-v`/`-q`
pub fn init_logging(verbose: &Verbosity<InfoLevel>) {
    env_logger::Builder::new()
        .filter_level(verbose.log_level_filter())
        .format_target(false)
        .init();
}
