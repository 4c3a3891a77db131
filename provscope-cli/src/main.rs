mod app;
mod commands;
mod output;

use clap::error::ErrorKind;
use clap::Parser;

use provscope::CancellationToken;

use crate::app::{Cli, Command};

/// Process exit codes: 0 all pass, 1 any failing verdict (or an incomplete run),
/// 64 usage error, 69 package unavailable, 70 internal error.
const EXIT_USAGE: i32 = 64;
const EXIT_INTERNAL: i32 = 70;

fn main() {
    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nCancelling...");
            token.cancel();
        })
        .expect("failed to set Ctrl+C handler");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                error.exit();
            }
            let _ = error.print();
            std::process::exit(EXIT_USAGE);
        }
    };

    // Show provscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("provscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let outcome = match &cli.command {
        Command::Check {
            path,
            extensions,
            strict_headers,
        } => commands::check::run(path, extensions, *strict_headers, &token, &cli.global),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(EXIT_INTERNAL);
        }
    }
}
