mod application;
mod presentation {
    pub mod cli;
}

use std::process::ExitCode;

use dcmdeid_core::DeidError;

fn main() -> ExitCode {
    match application::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(DeidError::CommandError(report)) => {
            eprintln!("{report}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
