//! Count frames streamed from a sensor until Ctrl-C.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::debug;
use miette::Result;
use sweeprec::client::connect;
use sweeprec::error::Error;
use sweeprec::interrupt::install_interrupt_handler;
use sweeprec::run::measure_throughput;
use sweeprec::sensor::SensorConfig;
use sweeprec::{init_logging, ClientArgs};
use sweeprec_core::{CancelToken, ConsoleProgress};

#[derive(Parser, Debug)]
#[command(name = "test-throughput", version, about = "Count frames arriving from a sensor")]
struct Cli {
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[clap(flatten)]
    client: ClientArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.verbose);
    debug!("{:?}", cli);

    let config = cli
        .client
        .sensor_config(SensorConfig::for_throughput())
        .map_err(Error::from)?;
    let transport = cli.client.transport().map_err(Error::from)?;
    let mut client = connect(&transport).map_err(Error::from)?;

    let cancel = CancelToken::new();
    let mut progress = ConsoleProgress::stdout("Received");
    let (summary, counter) = measure_throughput(
        client.as_mut(),
        &config,
        &cancel,
        &mut progress,
        || {
            install_interrupt_handler(cancel.clone()).map_err(Error::Interrupt)?;
            println!("Press Ctrl-C to end session");
            Ok(())
        },
    )?;

    println!(
        "Received {} frames in {:.1} s",
        summary.frames,
        counter.elapsed().as_secs_f64()
    );
    Ok(())
}
