//! td-usb — command-line driver for Tokyo Devices USB HID instruments.

use std::path::PathBuf;

use clap::Parser;
use tdusb_lib::TdError;

mod cli;

#[derive(Parser)]
#[command(
    name = "td-usb",
    version,
    about = "Command-line driver for Tokyo Devices USB HID instruments"
)]
struct Args {
    /// Log protocol traffic (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON (for models, list, init, get, read-reg, config)
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: cli::Command,
}

/// Unwrap `result`, or print the error and exit with its code.
///
/// Anything holding a device open must already be dropped: `process::exit`
/// runs no destructors.
fn or_exit<T>(result: Result<T, TdError>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code().code());
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    or_exit(cli::run(args.command, args.json, args.config.as_deref()));
}
