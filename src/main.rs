//! Binary entrypoint for the `revive` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env file is fine; settings fall back to the process environment.
    let _ = dotenvy::dotenv();
    // Recording is handled in commands::dispatch via REVIVE_RECORD=<dir>.
    match revive::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
