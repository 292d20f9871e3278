mod cli;
mod context;
mod error;
mod formatter;

pub use cli::{run, run_cli, run_cli_with_cancellation};
pub use error::{CliError, ExitStatus};
