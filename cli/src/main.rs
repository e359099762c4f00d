mod commands;
mod sink;
mod terminal;

use std::time::Duration;

use commands::{CommandLine, Commands, discover, monitor};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);

    match commands.command {
        Commands::Monitor { target, tuning } => {
            print::header("starting monitor");
            monitor::monitor(target, tuning.to_config()).await
        }
        Commands::Discover {
            target,
            workers,
            timeout_ms,
        } => {
            print::header("getting ready for discovery");
            discover::discover(target, workers, Duration::from_millis(timeout_ms)).await
        }
    }
}
