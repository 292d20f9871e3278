use std::process::ExitCode;

fn main() -> ExitCode {
    changed_pkgs_cli::run()
}
