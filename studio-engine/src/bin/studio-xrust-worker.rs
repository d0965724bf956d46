//! Worker process for isolated xrust transforms.
//!
//! Reads one JSON request on stdin and writes the run as JSON on stdout.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    match studio_engine::worker::serve(io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("studio-xrust-worker: {e}");
            ExitCode::FAILURE
        }
    }
}
