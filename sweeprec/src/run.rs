//! Session drivers behind the two command-line tools.
//!
//! Both drivers take an already connected [`Client`] and a [`CancelToken`],
//! so they run the same against a sensor, the emulator or a test double.

use log::{debug, info, warn};
use sweeprec_core::{sample_session, CancelToken, Progress, RunParameters, SessionSummary};

use crate::client::Client;
use crate::error::Error;
use crate::recording::{self, RecordMetadata, Recorder};
use crate::sensor::SensorConfig;
use crate::throughput::ThroughputCounter;

/// Record one session and save it to the validated output path.
///
/// `on_started` runs once the sensor streams, right before sampling begins;
/// the binary installs its interrupt handler there. If sampling fails the
/// client is still disconnected, the error is returned and nothing is saved.
pub fn record_session<F>(
    client: &mut dyn Client,
    params: &RunParameters,
    config: &SensorConfig,
    cancel: &CancelToken,
    progress: &mut dyn Progress,
    on_started: F,
) -> Result<SessionSummary, Error>
where
    F: FnOnce() -> Result<(), Error>,
{
    let session_info = client.setup_session(config)?;
    debug!("Session info: {:?}", session_info);

    let mut recorder = Recorder::new(
        config.clone(),
        session_info,
        RecordMetadata::from_params(params),
    );

    client.start_session()?;
    on_started()?;

    let summary = match sample_session(
        &mut *client,
        &mut recorder,
        cancel,
        params.frame_limit(),
        progress,
    ) {
        Ok(summary) => summary,
        Err(e) => {
            abandon(client);
            return Err(e.into());
        }
    };
    info!("Session ended by {:?} after {} frames", summary.reason, summary.frames);

    if let Err(e) = client.disconnect() {
        warn!("Disconnect failed, saving anyway: {}", e);
    }

    let record = recorder.close();
    recording::save(params.output(), &record)?;
    Ok(summary)
}

/// Stream frames into a counter until cancelled.
///
/// Returns the loop summary together with the counter.
pub fn measure_throughput<F>(
    client: &mut dyn Client,
    config: &SensorConfig,
    cancel: &CancelToken,
    progress: &mut dyn Progress,
    on_started: F,
) -> Result<(SessionSummary, ThroughputCounter), Error>
where
    F: FnOnce() -> Result<(), Error>,
{
    let session_info = client.start_streaming(config)?;
    debug!("Session info: {:?}", session_info);
    on_started()?;

    let mut counter = ThroughputCounter::new();
    let summary = match sample_session(&mut *client, &mut counter, cancel, None, progress) {
        Ok(summary) => summary,
        Err(e) => {
            abandon(client);
            return Err(e.into());
        }
    };

    info!("Disconnecting...");
    client.disconnect()?;
    Ok((summary, counter))
}

/// Best effort disconnect after a failed session
fn abandon(client: &mut dyn Client) {
    if let Err(e) = client.disconnect() {
        debug!("Disconnect after failure also failed: {}", e);
    }
}
