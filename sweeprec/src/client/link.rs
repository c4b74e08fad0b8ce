//! Frame link client.
//!
//! A small request/reply stream shared by the socket and serial transports.
//! Every message is a little-endian `u32` length followed by a bincode
//! payload:
//!
//! ```text
//! ┌───────────────┬──────────────────────────────┐
//! │ len (u32 LE)  │ bincode(Request | Reply)     │
//! └───────────────┴──────────────────────────────┘
//!
//!   client                         sensor side
//!     │ ── Setup(SensorConfig) ──►     │
//!     │ ◄── SessionInfo(info) ───      │
//!     │ ── Start ───────────────►      │
//!     │ ◄── Started ─────────────      │
//!     │ ◄── Frame(info, frame) ──  ... │
//!     │ ── Stop ────────────────►      │
//!     │ ◄── Stopped ─────────────      │
//! ```

use std::io::{self, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use strum::Display;
use sweeprec_core::FrameSource;

use super::Client;
use crate::error::ClientError;
use crate::sensor::{DataInfo, Frame, SensorConfig, SessionInfo};

/// Port used when a socket address has none
pub const DEFAULT_PORT: u16 = 6110;

/// UART speed of the sensor modules
pub const DEFAULT_BAUDRATE: u32 = 3_000_000;

/// Longest wait for serial data before the link counts as dead
const SERIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted message payload
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Frames still in flight after `Stop` that are skipped before giving up
const MAX_DRAIN_MESSAGES: usize = 1024;

/// Client to sensor messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Setup(SensorConfig),
    Start,
    Stop,
}

/// Sensor to client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    SessionInfo(SessionInfo),
    Started,
    Frame(DataInfo, Frame),
    Stopped,
    Error(String),
}

/// Write one length-prefixed message and flush
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), ClientError> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_MESSAGE_LEN {
        return Err(ClientError::MessageTooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed message, blocking until it is complete
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, ClientError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(ClientError::MessageTooLarge {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}

/// Add the default port to a bare host or IP address
pub fn socket_address(addr: &str) -> String {
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    match addr.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => addr.to_string(),
        _ => format!("{}:{}", addr, DEFAULT_PORT),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
enum LinkState {
    Connected,
    Configured,
    Streaming,
    Closed,
}

/// Link client over any bidirectional byte stream.
///
/// Reads go through a [`BufReader`]; writes go to a second handle of the
/// same stream. After setup every frame is checked against the configured
/// sensor count and the reported `data_length`.
pub struct LinkClient<T: Read + Write> {
    reader: BufReader<T>,
    writer: T,
    state: LinkState,
    frame_shape: Option<(usize, usize)>,
}

impl LinkClient<TcpStream> {
    /// Connect to a streaming server
    pub fn connect_tcp(addr: &str) -> Result<Self, ClientError> {
        let addr = socket_address(addr);
        let stream = TcpStream::connect(&addr)?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        let writer = stream.try_clone()?;
        Ok(Self::new(stream, writer))
    }
}

impl LinkClient<Box<dyn SerialPort>> {
    /// Open a serial port in raw mode at `baudrate`
    pub fn open_serial(path: &Path, baudrate: u32) -> Result<Self, ClientError> {
        let port = serialport::new(path.to_string_lossy(), baudrate)
            .timeout(SERIAL_TIMEOUT)
            .open()?;
        info!("Opened serial port {} at {} baud", path.display(), baudrate);
        let writer = port.try_clone()?;
        Ok(Self::new(port, writer))
    }
}

impl<T: Read + Write> LinkClient<T> {
    /// Wrap a read handle and a write handle of the same stream
    pub fn new(reader: T, writer: T) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            state: LinkState::Connected,
            frame_shape: None,
        }
    }

    fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        debug!("Link send {:?}", request);
        write_message(&mut self.writer, request)
    }

    fn receive(&mut self) -> Result<Reply, ClientError> {
        match read_message(&mut self.reader)? {
            Reply::Error(message) => Err(ClientError::Remote(message)),
            reply => Ok(reply),
        }
    }

    fn check_frame(&self, info: &DataInfo, frame: &Frame) -> Result<(), ClientError> {
        let Some((sensors, data_length)) = self.frame_shape else {
            return Ok(());
        };
        if frame.dim() != (sensors, data_length) {
            return Err(ClientError::Protocol(format!(
                "frame has shape {:?}, expected {:?}",
                frame.dim(),
                (sensors, data_length)
            )));
        }
        if info.len() != sensors {
            return Err(ClientError::Protocol(format!(
                "frame carries {} sensor infos, expected {}",
                info.len(),
                sensors
            )));
        }
        Ok(())
    }

    fn require(&self, expected: &[LinkState], call: &str) -> Result<(), ClientError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(ClientError::Protocol(format!(
                "{} not allowed while {}",
                call, self.state
            )))
        }
    }
}

impl<T: Read + Write> FrameSource for LinkClient<T> {
    type Info = DataInfo;
    type Frame = Frame;
    type Error = ClientError;

    fn get_next(&mut self) -> Result<(DataInfo, Frame), ClientError> {
        self.require(&[LinkState::Streaming], "get_next")?;
        match self.receive()? {
            Reply::Frame(info, frame) => {
                self.check_frame(&info, &frame)?;
                Ok((info, frame))
            }
            other => Err(ClientError::Protocol(format!(
                "expected a frame, got {}",
                reply_name(&other)
            ))),
        }
    }
}

impl<T: Read + Write> Client for LinkClient<T> {
    fn setup_session(&mut self, config: &SensorConfig) -> Result<SessionInfo, ClientError> {
        self.require(&[LinkState::Connected, LinkState::Configured], "setup_session")?;
        config.validate()?;
        self.send(&Request::Setup(config.clone()))?;
        match self.receive()? {
            Reply::SessionInfo(info) => {
                debug!("Session info {:?}", info);
                self.frame_shape = Some((config.sensors.len(), info.data_length));
                self.state = LinkState::Configured;
                Ok(info)
            }
            other => Err(ClientError::Protocol(format!(
                "expected session info, got {}",
                reply_name(&other)
            ))),
        }
    }

    fn start_session(&mut self) -> Result<(), ClientError> {
        self.require(&[LinkState::Configured], "start_session")?;
        self.send(&Request::Start)?;
        match self.receive()? {
            Reply::Started => {
                self.state = LinkState::Streaming;
                Ok(())
            }
            other => Err(ClientError::Protocol(format!(
                "expected start confirmation, got {}",
                reply_name(&other)
            ))),
        }
    }

    fn disconnect(&mut self) -> Result<(), ClientError> {
        let was_streaming = self.state == LinkState::Streaming;
        self.state = LinkState::Closed;
        if !was_streaming {
            return Ok(());
        }

        self.send(&Request::Stop)?;
        for _ in 0..MAX_DRAIN_MESSAGES {
            match self.receive() {
                Ok(Reply::Stopped) => {
                    debug!("Link stopped");
                    return Ok(());
                }
                Ok(_) => continue,
                Err(ClientError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Link closed by peer during stop");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        warn!(
            "No stop confirmation after {} messages, closing anyway",
            MAX_DRAIN_MESSAGES
        );
        Ok(())
    }
}

fn reply_name(reply: &Reply) -> &'static str {
    match reply {
        Reply::SessionInfo(_) => "session info",
        Reply::Started => "start confirmation",
        Reply::Frame(..) => "frame",
        Reply::Stopped => "stop confirmation",
        Reply::Error(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorDataInfo;
    use ndarray::Array2;
    use num_complex::Complex32;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    fn session_info() -> SessionInfo {
        SessionInfo {
            data_length: 4,
            range_start_m: 0.2,
            range_length_m: 0.4,
            step_length_m: 0.1,
        }
    }

    fn frame(seq: u32) -> (DataInfo, Frame) {
        let info = vec![SensorDataInfo {
            sequence_number: seq,
            missed_data: false,
            data_saturated: seq == 2,
        }];
        let frame = Array2::from_shape_fn((1, 4), |(_, i)| Complex32::new(seq as f32, i as f32));
        (info, frame)
    }

    /// Serve one session of `frames` frames, then answer Stop
    fn serve(stream: TcpStream, frames: u32) -> Vec<Request> {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut seen = Vec::new();

        let request: Request = read_message(&mut reader).unwrap();
        assert!(matches!(request, Request::Setup(_)));
        seen.push(request);
        write_message(&mut writer, &Reply::SessionInfo(session_info())).unwrap();

        let request: Request = read_message(&mut reader).unwrap();
        assert_eq!(request, Request::Start);
        seen.push(request);
        write_message(&mut writer, &Reply::Started).unwrap();

        for seq in 0..frames {
            let (info, frame) = frame(seq);
            write_message(&mut writer, &Reply::Frame(info, frame)).unwrap();
        }

        let request: Request = read_message(&mut reader).unwrap();
        assert_eq!(request, Request::Stop);
        seen.push(request);
        write_message(&mut writer, &Reply::Stopped).unwrap();
        seen
    }

    #[test]
    fn test_message_roundtrip() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Request::Start).unwrap();
        assert_eq!(&buf[0..4], &((buf.len() - 4) as u32).to_le_bytes());

        let mut cursor = Cursor::new(buf);
        let request: Request = read_message(&mut cursor).unwrap();
        assert_eq!(request, Request::Start);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_MESSAGE_LEN as u32 + 1).to_le_bytes());
        let result: Result<Reply, _> = read_message(&mut Cursor::new(buf));
        assert!(matches!(result, Err(ClientError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_socket_address() {
        assert_eq!(socket_address("192.168.1.10"), "192.168.1.10:6110");
        assert_eq!(socket_address("192.168.1.10:7000"), "192.168.1.10:7000");
        assert_eq!(socket_address("::1"), "[::1]:6110");
        assert_eq!(socket_address("[::1]:7000"), "[::1]:7000");
        assert_eq!(socket_address("sensor.local"), "sensor.local:6110");
        assert_eq!(socket_address("sensor.local:80"), "sensor.local:80");
    }

    #[test]
    fn test_tcp_session() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, 3)
        });

        let mut client = LinkClient::connect_tcp(&addr.to_string()).unwrap();
        let mut config = SensorConfig::for_throughput();
        config.update_rate = None;

        let info = client.setup_session(&config).unwrap();
        assert_eq!(info, session_info());
        client.start_session().unwrap();

        for seq in 0..2 {
            let (info, frame) = client.get_next().unwrap();
            assert_eq!(info[0].sequence_number, seq);
            assert_eq!(frame[[0, 3]], Complex32::new(seq as f32, 3.0));
        }

        // Third frame is still in flight and gets drained
        client.disconnect().unwrap();

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], Request::Setup(config));
    }

    #[test]
    fn test_calls_out_of_order() {
        let (a, b) = (Cursor::new(Vec::new()), Cursor::new(Vec::new()));
        let mut client = LinkClient::new(a, b);

        match client.get_next() {
            Err(ClientError::Protocol(message)) => {
                assert_eq!(message, "get_next not allowed while connected")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(client.start_session(), Err(ClientError::Protocol(_))));
        client.disconnect().unwrap();
        assert!(matches!(
            client.setup_session(&SensorConfig::for_recording()),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn test_remote_error() {
        let mut replies = Vec::new();
        write_message(&mut replies, &Reply::Error("sensor 2 not connected".to_string())).unwrap();

        let mut client = LinkClient::new(Cursor::new(replies), Cursor::new(Vec::new()));
        let result = client.setup_session(&SensorConfig::for_recording());
        match result {
            Err(ClientError::Remote(message)) => assert_eq!(message, "sensor 2 not connected"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_peer_closing_is_transport_failure() {
        let mut replies = Vec::new();
        write_message(&mut replies, &Reply::SessionInfo(session_info())).unwrap();
        write_message(&mut replies, &Reply::Started).unwrap();
        let (info, frame) = frame(0);
        write_message(&mut replies, &Reply::Frame(info, frame)).unwrap();

        let mut client = LinkClient::new(Cursor::new(replies), Cursor::new(Vec::new()));
        client.start_streaming(&SensorConfig::for_recording()).unwrap();
        client.get_next().unwrap();
        assert!(matches!(client.get_next(), Err(ClientError::Io(_))));
    }

    #[test]
    fn test_frame_shape_checked_on_arrival() {
        let mut replies = Vec::new();
        write_message(&mut replies, &Reply::SessionInfo(session_info())).unwrap();
        write_message(&mut replies, &Reply::Started).unwrap();
        let (info, good) = frame(0);
        write_message(&mut replies, &Reply::Frame(info.clone(), good)).unwrap();
        let wide = Array2::zeros((1, 5));
        write_message(&mut replies, &Reply::Frame(info.clone(), wide)).unwrap();
        let (_, good) = frame(2);
        write_message(&mut replies, &Reply::Frame(vec![], good)).unwrap();

        let mut client = LinkClient::new(Cursor::new(replies), Cursor::new(Vec::new()));
        client.start_streaming(&SensorConfig::for_recording()).unwrap();
        client.get_next().unwrap();

        match client.get_next() {
            Err(ClientError::Protocol(message)) => {
                assert_eq!(message, "frame has shape (1, 5), expected (1, 4)")
            }
            other => panic!("unexpected {:?}", other),
        }
        match client.get_next() {
            Err(ClientError::Protocol(message)) => {
                assert_eq!(message, "frame carries 0 sensor infos, expected 1")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_serial_port() {
        let dir = tempfile::tempdir().unwrap();
        let result = LinkClient::open_serial(&dir.path().join("ttyUSB7"), DEFAULT_BAUDRATE);
        assert!(matches!(result, Err(ClientError::Serial(_))));
    }
}
