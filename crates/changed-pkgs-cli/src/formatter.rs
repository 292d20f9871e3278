use std::io::Write;
use std::process::ExitCode;

use serde::Serialize;

use crate::error::{CliError, ExitStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
pub struct ImpactReport {
    pub from_ref: String,
    pub to_ref: String,
    pub packages: Vec<String>,
    pub modules: Vec<String>,
}

/// Writes the report to `out`: one package path per line as text, or a single JSON
/// document.
pub fn emit_result<W: Write>(
    report: &ImpactReport,
    format: OutputFormat,
    out: &mut W,
) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => {
            for pkg in &report.packages {
                writeln!(out, "{pkg}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, report)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(ExitCode::from(ExitStatus::Ok.code()))
}
