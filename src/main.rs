//! `dotbackup` command-line entry point.
use std::process::ExitCode;

use clap::Parser;

use dotbackup_cli::cancel::CancelToken;
use dotbackup_cli::cli::{Cli, Command};
use dotbackup_cli::commands;
use dotbackup_cli::error::exit_code_for;
use dotbackup_cli::host::HostInfo;
use dotbackup_cli::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return ExitCode::SUCCESS;
    }

    let host = HostInfo::detect();
    let log_file = logging::log_file_path(&host.cache_dir, args.command.name());
    logging::init_subscriber(args.verbose, log_file.as_deref());
    let log = Logger::new(log_file);

    let result = CancelToken::install()
        .map_err(anyhow::Error::from)
        .and_then(|cancel| match &args.command {
            Command::Backup(opts) => {
                commands::backup::run(&args.global, opts, &host, &log, &cancel)
            }
            Command::Restore(opts) => {
                commands::restore::run(&args.global, opts, &host, &log, &cancel)
            }
            Command::List => commands::list::run(&args.global, &host, &log),
            Command::Version => Ok(()),
        });

    log.print_summary();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log.error(&format!("{err:#}"));
            ExitCode::from(exit_code_for(&err))
        }
    }
}
