use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use talaria_daemon::{run, Cli};
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Dispatcher", move |handle| {
            run(handle, args)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .into_diagnostic()
}
