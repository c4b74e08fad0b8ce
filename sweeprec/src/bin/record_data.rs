//! Record a labelled sweep session to a file.

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::debug;
use miette::Result;
use sweeprec::client::connect;
use sweeprec::error::Error;
use sweeprec::interrupt::install_interrupt_handler;
use sweeprec::recording::SUPPORTED_FORMATS;
use sweeprec::run::record_session;
use sweeprec::sensor::SensorConfig;
use sweeprec::{init_logging, ClientArgs};
use sweeprec_core::{CancelToken, ConsoleProgress, RunArgs, RunParameters};

#[derive(Parser, Debug)]
#[command(name = "record-data", version, about = "Record a labelled radar sweep session")]
struct Cli {
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[clap(flatten)]
    client: ClientArgs,

    /// Temperature at the sensor in °C, `.` as decimal separator
    #[arg(short = 't', long = "temp", allow_hyphen_values = true)]
    temperature: String,

    /// Surface under the sensor: snow, wet, ice, dry or metal
    #[arg(short, long)]
    label: String,

    /// Output file; the extension selects the format
    #[arg(short, long = "output-file")]
    output: PathBuf,

    /// Stop after this many frames
    #[arg(long = "limit-frames", visible_alias = "lim", allow_negative_numbers = true)]
    limit_frames: Option<i64>,

    /// Mounting angle, stored as given
    #[arg(short, long, allow_hyphen_values = true)]
    angle: String,

    /// Distance to the surface, stored as given
    #[arg(short, long, allow_hyphen_values = true)]
    distance: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.verbose);
    debug!("{:?}", cli);

    let params = RunParameters::validate(
        RunArgs {
            temperature: cli.temperature,
            label: cli.label,
            output: cli.output,
            frame_limit: cli.limit_frames,
            angle: cli.angle,
            distance: cli.distance,
        },
        SUPPORTED_FORMATS,
    )
    .map_err(Error::from)?;
    let config = cli
        .client
        .sensor_config(SensorConfig::for_recording())
        .map_err(Error::from)?;

    let transport = cli.client.transport().map_err(Error::from)?;
    let mut client = connect(&transport).map_err(Error::from)?;

    let cancel = CancelToken::new();
    let mut progress = ConsoleProgress::stdout("Sampled");
    record_session(
        client.as_mut(),
        &params,
        &config,
        &cancel,
        &mut progress,
        || {
            install_interrupt_handler(cancel.clone()).map_err(Error::Interrupt)?;
            println!("Press Ctrl-C to end session");
            Ok(())
        },
    )?;

    println!("Saved to '{}'", params.output().display());
    Ok(())
}
