//! Command line front end of the offline protocol linter.

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod trace;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fail to load the configuration: {err}");
            return cli::Status::Unreadable.into();
        }
    };
    trace::init(&config.tracing);
    cli.run(config).into()
}
