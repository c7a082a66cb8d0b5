//! faz - local issue tracking for AI agents and humans

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = faz::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
