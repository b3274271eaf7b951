use std::process::ExitCode;

use clap::Parser;
use vincam::cli::{run, Args};

fn main() -> ExitCode {
    let args = Args::parse();
    vincam::logger::init(args.log_level);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
