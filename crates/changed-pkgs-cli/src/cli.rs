use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use changed_pkgs::{CancellationToken, ImpactRequest, changed_packages};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use crate::context::CliSession;
use crate::error::CliError;
use crate::formatter::{ImpactReport, OutputFormat, emit_result};

const NAME: &str = "changed-go-packages";
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Entry point for the binary: interrupts cancel running `git`/`go` processes and
/// exit with 130.
pub fn run() -> ExitCode {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        eprintln!("failed to install interrupt handler: {err}");
    }

    match run_cli_with_cancellation(std::env::args(), token) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses `args` and prints the packages changed between the two requested
/// revisions.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    run_cli_with_cancellation(args, CancellationToken::new())
}

pub fn run_cli_with_cancellation<I, S>(
    args: I,
    token: CancellationToken,
) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;
    init_tracing(matches.get_one::<String>("log-level").map(String::as_str));

    let format = if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let result = print_changed_packages(&matches, token.clone(), format);
    match result {
        // an interrupt can kill a child before the handler flips the token
        Err(_) if token.is_cancelled() => Err(CliError::interrupted()),
        other => other,
    }
}

fn print_changed_packages(
    matches: &ArgMatches,
    token: CancellationToken,
    format: OutputFormat,
) -> Result<ExitCode, CliError> {
    let from_ref = required(matches, "from-ref");
    let to_ref = required(matches, "to-ref");
    let repo_dir = required(matches, "repo-dir");
    let mod_dir = required(matches, "mod-dir");

    let session = CliSession::bootstrap(&repo_dir, &mod_dir, token)?;
    tracing::info!(
        repo = %session.paths.repo_root().display(),
        module = %session.paths.module_root().display(),
        "resolved repository context"
    );

    let request = ImpactRequest {
        paths: session.paths.clone(),
        from_ref: from_ref.clone(),
        to_ref: to_ref.clone(),
    };
    let changes = changed_packages(&session.env, &request)?;

    let report = ImpactReport {
        from_ref,
        to_ref,
        packages: changes.packages.into_iter().collect(),
        modules: changes.modules.into_iter().collect(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    emit_result(&report, format, &mut out)
}

fn required(matches: &ArgMatches, id: &str) -> String {
    matches.get_one::<String>(id).cloned().unwrap_or_default()
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Get the changed Go packages between two commits")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("from-ref")
                .long("from-ref")
                .value_name("REF")
                .required(true)
                .help("Revision to compare from."),
        )
        .arg(
            Arg::new("to-ref")
                .long("to-ref")
                .value_name("REF")
                .required(true)
                .help("Revision to compare to."),
        )
        .arg(
            Arg::new("repo-dir")
                .long("repo-dir")
                .value_name("PATH")
                .default_value(".")
                .help("The Git repo to inspect."),
        )
        .arg(
            Arg::new("mod-dir")
                .long("mod-dir")
                .value_name("PATH")
                .default_value(".")
                .help("Path to the directory containing go.mod. Used to find local packages."),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(PossibleValuesParser::new([
                    "error", "warn", "info", "debug", "trace",
                ]))
                .help("Log level for messages on stderr. Defaults to RUST_LOG, then warn."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Emit a JSON document instead of one package per line."),
        )
}
