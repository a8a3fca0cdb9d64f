//! CLI arguments and the lint run.

use clap::Parser;
use parley::Config;
use parley::lint::{Check, LintReport, Linter, load_dataset};
use std::path::PathBuf;
use std::process::ExitCode;

/// Outcome of a lint run, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Every enabled check passed.
    Passed = 0,
    /// At least one check failed.
    Failed = 1,
    /// An input could not be read.
    Unreadable = 2,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status as u8)
    }
}

/// Checks stored tool-call conversations for protocol violations.
#[derive(Debug, Parser)]
#[clap(name = "parley-lint", version)]
pub(crate) struct Cli {
    /// Dataset files, each a JSON array of records.
    #[clap(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
    /// TOML configuration file.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Report every offending record instead of the first one per check.
    #[clap(long)]
    exhaustive: bool,
    /// Run only the named check. May be repeated.
    #[clap(long = "check", value_name = "NAME")]
    checks: Vec<Check>,
}

impl Cli {
    /// Loads the configuration file, or the defaults without one.
    pub(crate) fn load_config(&self) -> parley::Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }

    /// Builds the linter from the configuration and the command line overrides.
    fn linter(&self, config: &Config) -> Linter {
        let linter = if self.checks.is_empty() {
            Linter::from_config(&config.lint)
        } else {
            Linter::new(self.checks.iter().copied()).exhaustive(config.lint.exhaustive)
        };
        if self.exhaustive {
            linter.exhaustive(true)
        } else {
            linter
        }
    }

    /// Lints every dataset as one corpus.
    pub(crate) fn run(self, config: Config) -> Status {
        let mut records = Vec::new();
        for path in &self.paths {
            match load_dataset(path) {
                Ok(dataset) => records.extend(dataset),
                Err(err) => {
                    tracing::error!(path = %path.display(), "fail to read the dataset: {err}");
                    eprintln!("fail to read `{}`: {err}", path.display());
                    return Status::Unreadable;
                }
            }
        }

        let linter = self.linter(&config);
        tracing::info!(records = records.len(), checks = linter.checks().len(), "linting");
        let report = linter.run(&records);
        print_report(&report);
        if report.passed() {
            Status::Passed
        } else {
            Status::Failed
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_report(report: &LintReport) {
    for outcome in &report.outcomes {
        if outcome.passed() {
            println!("{}: passed", outcome.check);
        }
        for failure in &outcome.failures {
            println!("{}: FAILED {failure}", outcome.check);
        }
    }
    if report.passed() {
        println!("All checks passed.");
    } else {
        println!("{} check(s) failed.", report.failed().count());
    }
}
