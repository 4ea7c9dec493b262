use clap::Parser;

use picforge::cli::{self, CliArgs};
use picforge::logger;

fn main() -> std::process::ExitCode {
    // Session log (overwrites the previous session's file)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
