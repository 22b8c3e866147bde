mod app;
mod output;

use std::{
    io::{self, Write},
    panic,
};

use bephookgen::{
    pipeline::{Pipeline, PipelineConfig},
    Error,
};
use clap::{error::ErrorKind, Parser};
use log::{error, info};

use crate::app::Cli;

/// Success, including `--help` and `--version`
const EXIT_SUCCESS: i32 = 0;
/// Unhandled failure or panic
const EXIT_FAILURE: i32 = -1;
/// Invalid command line
const EXIT_USAGE: i32 = -2;
/// A file failed in one of the pipeline stages
const EXIT_STAGE: i32 = -3;

fn main() {
    panic::set_hook(Box::new(|info| println!("{info}")));
    let code = panic::catch_unwind(run).unwrap_or(EXIT_FAILURE);
    std::process::exit(code);
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, &mut io::stdout().lock()),
    };

    init_logging(cli.verbose);

    if let Err(error) = ctrlc::set_handler(|| {
        println!("\nCancelled.");
        std::process::exit(130);
    }) {
        log::warn!("Failed to install the Ctrl+C handler: {error}");
    }

    match execute(&cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(error) => {
            error!("{error}");
            exit_code(&error)
        }
    }
}

/// Logs go to stdout; `--verbose` enables debug; `RUST_LOG` overrides.
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_module("bephookgen", level)
        .filter_module("bephookgen_cli", level)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();
}

fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::for_game_root(&cli.game_root)?;

    info!("Managed directory: {}", config.managed_dir().display());
    let report = Pipeline::new(config).run()?;

    output::summary(&report).print();
    info!(
        "{} processed, {} up to date",
        report.processed(),
        report.skipped()
    );

    Ok(())
}

/// Prints help, version or a usage error to `out` and picks the exit code.
fn report_usage(error: &clap::Error, out: &mut impl Write) -> i32 {
    // Printing only fails when the terminal is gone
    let _ = write!(out, "{}", error.render());
    let _ = out.flush();
    usage_exit_code(error.kind())
}

fn usage_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
        _ => EXIT_USAGE,
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<Error>() {
        Some(Error::Stage { .. }) => EXIT_STAGE,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsStr, path::PathBuf};

    use bephookgen::Stage;

    use super::*;

    #[test]
    fn one_positional_argument() {
        let cli = Cli::try_parse_from(["bephookgen", "/games/valheim", "-v"]).unwrap();
        assert_eq!(cli.game_root, PathBuf::from("/games/valheim"));
        assert!(cli.verbose);
    }

    #[test]
    fn argument_errors() {
        let missing = Cli::try_parse_from(["bephookgen"]).unwrap_err();
        assert_eq!(usage_exit_code(missing.kind()), EXIT_USAGE);

        let extra = Cli::try_parse_from(["bephookgen", "a", "b"]).unwrap_err();
        assert_eq!(usage_exit_code(extra.kind()), EXIT_USAGE);

        let unknown = Cli::try_parse_from(["bephookgen", "a", "--frobnicate"]).unwrap_err();
        assert_eq!(usage_exit_code(unknown.kind()), EXIT_USAGE);
    }

    #[test]
    fn usage_errors_are_printed() {
        let missing = Cli::try_parse_from(["bephookgen"]).unwrap_err();
        let mut out = Vec::new();
        assert_eq!(report_usage(&missing, &mut out), EXIT_USAGE);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<GAME_ROOT>"));
        assert!(text.contains("Usage"));

        let extra = Cli::try_parse_from(["bephookgen", "a", "b"]).unwrap_err();
        let mut out = Vec::new();
        assert_eq!(report_usage(&extra, &mut out), EXIT_USAGE);
        assert!(String::from_utf8(out).unwrap().contains("'b'"));

        let help = Cli::try_parse_from(["bephookgen", "--help"]).unwrap_err();
        let mut out = Vec::new();
        assert_eq!(report_usage(&help, &mut out), EXIT_SUCCESS);
        assert!(String::from_utf8(out).unwrap().contains("GAME_ROOT"));
    }

    #[test]
    fn help_and_version() {
        let help = Cli::try_parse_from(["bephookgen", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(help.kind()), EXIT_SUCCESS);

        let version = Cli::try_parse_from(["bephookgen", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(version.kind()), EXIT_SUCCESS);
    }

    #[test]
    fn stage_failures() {
        let staged = Error::Empty.in_stage("assembly_valheim.dll", Stage::Publicize);
        let error = anyhow::Error::from(staged);
        assert_eq!(exit_code(&error), EXIT_STAGE);

        let logged = format!("{error}");
        assert!(logged.starts_with("publicize failed for 'assembly_valheim.dll'"));
        assert_eq!(logged.matches("Provided input was empty").count(), 1);
    }

    #[test]
    fn other_failures() {
        let missing = anyhow::Error::from(Error::ManagedDirNotFound(PathBuf::from("/nowhere")))
            .context("'/nowhere' is not a Valheim installation");
        assert_eq!(exit_code(&missing), EXIT_FAILURE);

        assert_eq!(exit_code(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }

    #[test]
    fn missing_game_root() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([OsStr::new("bephookgen"), dir.path().as_os_str()]).unwrap();

        let error = execute(&cli).unwrap_err();
        assert_eq!(exit_code(&error), EXIT_FAILURE);
        assert!(format!("{error}").starts_with("No Managed directory found below"));
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ManagedDirNotFound(_))
        ));
    }
}
