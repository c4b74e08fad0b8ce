//! End-to-end recording through the link protocol and the emulator.

use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;
use std::thread;

use sweeprec::client::link::{read_message, write_message, Reply, Request};
use sweeprec::client::{connect, Client, EmulatedClient, Transport};
use sweeprec::error::Error;
use sweeprec::recording::{npy, npz, SUPPORTED_FORMATS};
use sweeprec::run::record_session;
use sweeprec::sensor::{DataInfo, SensorConfig, SessionInfo};
use sweeprec_core::{
    CancelToken, FrameSource, NoProgress, RunArgs, RunParameters, TerminationReason,
    ValidationError,
};
use tempfile::tempdir;

fn run_args(output: PathBuf, limit: Option<i64>) -> RunArgs {
    RunArgs {
        temperature: "-1.5".to_string(),
        label: "ICE".to_string(),
        output,
        frame_limit: limit,
        angle: "45".to_string(),
        distance: "0.8".to_string(),
    }
}

fn members(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    npz::read_archive(&fs::read(path).unwrap()).unwrap()
}

fn member<'a>(members: &'a [(String, Vec<u8>)], key: &str) -> &'a [u8] {
    &members.iter().find(|(k, _)| k == key).unwrap().1
}

/// Serve one link session backed by the emulator, sending `frames` frames
fn serve_emulated(listener: TcpListener, frames: usize) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = stream.try_clone().unwrap();
        let mut writer = stream;
        let mut sensor = EmulatedClient::new();

        match read_message(&mut reader).unwrap() {
            Request::Setup(config) => {
                let info = sensor.setup_session(&config).unwrap();
                write_message(&mut writer, &Reply::SessionInfo(info)).unwrap();
            }
            other => panic!("expected setup, got {:?}", other),
        }
        assert_eq!(read_message::<_, Request>(&mut reader).unwrap(), Request::Start);
        sensor.start_session().unwrap();
        write_message(&mut writer, &Reply::Started).unwrap();

        for _ in 0..frames {
            let (info, frame) = sensor.get_next().unwrap();
            write_message(&mut writer, &Reply::Frame(info, frame)).unwrap();
        }

        assert_eq!(read_message::<_, Request>(&mut reader).unwrap(), Request::Stop);
        write_message(&mut writer, &Reply::Stopped).unwrap();
    })
}

#[test]
fn test_record_over_socket() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ice.npz");
    let params = RunParameters::validate(run_args(path.clone(), Some(4)), SUPPORTED_FORMATS).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = serve_emulated(listener, 10);

    let config = SensorConfig {
        sensors: vec![1, 2],
        update_rate: None,
        range_interval: [0.2, 0.3],
    };
    let mut client = connect(&Transport::Socket(addr)).unwrap();
    let summary = record_session(
        client.as_mut(),
        &params,
        &config,
        &CancelToken::new(),
        &mut NoProgress,
        || Ok(()),
    )
    .unwrap();
    server.join().unwrap();

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.reason, TerminationReason::FrameLimitReached);

    let members = members(&path);
    let session: SessionInfo =
        serde_json::from_str(&npy::read_unicode_scalar(member(&members, "session_info")).unwrap())
            .unwrap();
    let (shape, values) = npy::read_complex64(member(&members, "data")).unwrap();
    assert_eq!(shape, vec![4, 2, session.data_length]);
    assert_eq!(values.len(), 4 * 2 * session.data_length);

    let data_info: Vec<DataInfo> =
        serde_json::from_str(&npy::read_unicode_scalar(member(&members, "data_info")).unwrap())
            .unwrap();
    let sequence: Vec<u32> = data_info.iter().map(|d| d[0].sequence_number).collect();
    assert_eq!(sequence, vec![0, 1, 2, 3]);

    assert_eq!(npy::read_unicode_scalar(member(&members, "label")).unwrap(), "ice");
    assert_eq!(npy::read_unicode_scalar(member(&members, "angle")).unwrap(), "45");
    assert_eq!(npy::read_unicode_scalar(member(&members, "mode")).unwrap(), "iq");
    assert_eq!(
        npy::read_float64_scalar(member(&members, "temperature")).unwrap(),
        -1.5
    );
}

#[test]
fn test_record_from_emulator_matches_live_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("emulated.npz");
    let params = RunParameters::validate(run_args(path.clone(), Some(3)), SUPPORTED_FORMATS).unwrap();
    let config = SensorConfig {
        update_rate: None,
        ..SensorConfig::for_throughput()
    };

    let mut client = connect(&Transport::Emulator).unwrap();
    record_session(
        client.as_mut(),
        &params,
        &config,
        &CancelToken::new(),
        &mut NoProgress,
        || Ok(()),
    )
    .unwrap();

    let mut reference = EmulatedClient::new();
    reference.start_streaming(&config).unwrap();
    let expected: Vec<_> = (0..3)
        .flat_map(|_| {
            let (_, frame) = reference.get_next().unwrap();
            frame.iter().copied().collect::<Vec<_>>()
        })
        .collect();

    let members = members(&path);
    let (_, values) = npy::read_complex64(member(&members, "data")).unwrap();
    assert_eq!(values, expected);
}

#[test]
fn test_validation_rejects_before_any_io() {
    let dir = tempdir().unwrap();

    let taken = dir.path().join("taken.npz");
    fs::write(&taken, b"previous run").unwrap();
    let err = RunParameters::validate(run_args(taken.clone(), None), SUPPORTED_FORMATS)
        .map_err(Error::from)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::OutputAlreadyExists { .. })
    ));
    assert_eq!(fs::read(&taken).unwrap(), b"previous run");

    let txt = dir.path().join("out.txt");
    assert!(matches!(
        RunParameters::validate(run_args(txt.clone(), None), SUPPORTED_FORMATS),
        Err(ValidationError::UnsupportedExtension { .. })
    ));
    assert!(!txt.exists());

    let h5 = dir.path().join("out.h5");
    let h5_result = RunParameters::validate(run_args(h5.clone(), None), SUPPORTED_FORMATS);
    if cfg!(feature = "hdf5") {
        assert!(h5_result.is_ok());
    } else {
        assert!(matches!(
            h5_result,
            Err(ValidationError::UnsupportedExtension { .. })
        ));
    }
    assert!(!h5.exists());

    assert!(matches!(
        RunParameters::validate(run_args(dir.path().join("zero.npz"), Some(0)), SUPPORTED_FORMATS),
        Err(ValidationError::InvalidFrameLimit { value: 0 })
    ));
}
