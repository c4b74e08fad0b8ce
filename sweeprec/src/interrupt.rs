//! Ctrl-C handling for the sampling loop.

use std::io;
use std::thread;

use log::{error, info, warn};
use sweeprec_core::CancelToken;

/// Exit status used when a second interrupt forces an immediate exit
pub const FORCED_EXIT_STATUS: i32 = 130;

/// Cancel `token` on the first Ctrl-C.
///
/// A helper thread runs a single-threaded tokio runtime that only waits for
/// the signal. The sampling loop notices the token between frames; a second
/// Ctrl-C exits the process right away.
pub fn install_interrupt_handler(token: CancelToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Cannot listen for Ctrl-C: {}", e);
                    return;
                }
                info!("Interrupted, stopping after the current frame");
                token.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted again, exiting now");
                    std::process::exit(FORCED_EXIT_STATUS);
                }
            });
        })?;

    Ok(())
}
