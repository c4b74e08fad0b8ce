//! Sensor clients.
//!
//! Every transport is driven through the [`Client`] trait, which extends the
//! core [`FrameSource`] with session setup and teardown. The sampling loop
//! only sees the frame source half and never learns which transport is in
//! use.
//!
//! | Transport            | Implementation                                  |
//! |----------------------|-------------------------------------------------|
//! | [`Transport::Socket`]   | [`LinkClient`] over TCP                      |
//! | [`Transport::Uart`]     | [`LinkClient`] over a raw serial port        |
//! | [`Transport::Spi`]      | not available, [`ClientError::Unsupported`] |
//! | [`Transport::Emulator`] | [`EmulatedClient`], synthetic sweeps         |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use sweeprec_core::FrameSource;

use crate::error::ClientError;
use crate::sensor::{DataInfo, Frame, SensorConfig, SessionInfo};

pub mod emulator;
pub mod link;

pub use emulator::EmulatedClient;
pub use link::LinkClient;

/// Device node prefixes that usually belong to a sensor's USB serial bridge
const SERIAL_PORT_PREFIXES: [&str; 2] = ["ttyUSB", "ttyACM"];

/// A connected sensor client.
///
/// Call order is `setup_session`, `start_session`, any number of
/// `get_next`, then `disconnect`.
pub trait Client: FrameSource<Info = DataInfo, Frame = Frame, Error = ClientError> {
    /// Configure the sensor and report the resulting session parameters
    fn setup_session(&mut self, config: &SensorConfig) -> Result<SessionInfo, ClientError>;

    /// Start producing frames
    fn start_session(&mut self) -> Result<(), ClientError>;

    /// Setup and start in one step
    fn start_streaming(&mut self, config: &SensorConfig) -> Result<SessionInfo, ClientError> {
        let info = self.setup_session(config)?;
        self.start_session()?;
        Ok(info)
    }

    /// Stop the session and release the connection
    fn disconnect(&mut self) -> Result<(), ClientError>;
}

/// How to reach the sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Streaming server address, `host` or `host:port`
    Socket(String),
    Spi,
    /// Serial port and its speed
    Uart { port: PathBuf, baudrate: u32 },
    Emulator,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Socket(addr) => write!(f, "socket {}", addr),
            Transport::Spi => write!(f, "SPI"),
            Transport::Uart { port, baudrate } => {
                write!(f, "UART {} at {} baud", port.display(), baudrate)
            }
            Transport::Emulator => write!(f, "emulator"),
        }
    }
}

/// Open a client for the given transport
pub fn connect(transport: &Transport) -> Result<Box<dyn Client>, ClientError> {
    info!("Connecting via {}", transport);
    let client: Box<dyn Client> = match transport {
        Transport::Socket(addr) => Box::new(LinkClient::connect_tcp(addr)?),
        Transport::Spi => return Err(ClientError::Unsupported("SPI")),
        Transport::Uart { port, baudrate } => Box::new(LinkClient::open_serial(port, *baudrate)?),
        Transport::Emulator => Box::new(EmulatedClient::new()),
    };
    Ok(client)
}

/// Find the first serial port that looks like a sensor under `/dev`
pub fn autodetect_serial_port() -> Result<PathBuf, ClientError> {
    let port = find_serial_port(Path::new("/dev"))?;
    info!("Autodetected serial port {}", port.display());
    Ok(port)
}

/// Pick the first matching device node in `dir`, in name order
pub fn find_serial_port(dir: &Path) -> Result<PathBuf, ClientError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {} for serial ports: {}", dir.display(), e);
            return Err(ClientError::NoSerialPort);
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| SERIAL_PORT_PREFIXES.iter().any(|p| name.starts_with(p)))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or(ClientError::NoSerialPort)
}
