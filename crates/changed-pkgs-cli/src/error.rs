use std::fmt;
use std::process::ExitCode;

use changed_pkgs::ChangedPkgsError;
use clap::error::ErrorKind as ClapErrorKind;

const EX_OK: u8 = 0;
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_OSERR: u8 = 71;
// 128 + SIGINT
const EX_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    Usage,
    Data,
    Io,
    Software,
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => EX_OK,
            ExitStatus::Usage => EX_USAGE,
            ExitStatus::Data => EX_DATAERR,
            ExitStatus::Io => EX_OSERR,
            ExitStatus::Software => EX_SOFTWARE,
            ExitStatus::Interrupted => EX_INTERRUPTED,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    message: String,
    status: ExitStatus,
}

impl CliError {
    pub fn new(message: impl Into<String>, status: ExitStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn interrupted() -> Self {
        CliError::new("interrupted (^C)", ExitStatus::Interrupted)
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status.code())
    }

    pub fn print(&self) {
        if !self.message.is_empty() {
            eprintln!("{}", self.message);
        }
    }
}

impl From<ChangedPkgsError> for CliError {
    fn from(err: ChangedPkgsError) -> Self {
        let status = match err.root() {
            ChangedPkgsError::Cancelled => return CliError::interrupted(),
            ChangedPkgsError::InvalidRevision(_) | ChangedPkgsError::Workspace(_) => {
                ExitStatus::Usage
            }
            ChangedPkgsError::MissingAtRevision { .. }
            | ChangedPkgsError::Manifest { .. }
            | ChangedPkgsError::PackageLoad { .. }
            | ChangedPkgsError::Graph(_) => ExitStatus::Data,
            ChangedPkgsError::Io(_) => ExitStatus::Io,
            // command failures and serialization; root() never yields a Context
            _ => ExitStatus::Software,
        };
        CliError::new(format!("getting changed packages: {err}"), status)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        let status = match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitStatus::Ok,
            _ => ExitStatus::Usage,
        };
        if status == ExitStatus::Ok {
            let _ = err.print();
            CliError::new(String::new(), status)
        } else {
            CliError::new(err.to_string(), status)
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::new(err.to_string(), ExitStatus::Io)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(format!("encoding output: {err}"), ExitStatus::Software)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}
