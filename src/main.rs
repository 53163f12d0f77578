//! unleash - version-stamp, build and package Xcode projects.
//!
//! This binary drives one release run from the command line and exits with 0
//! when the run completes, 1 otherwise.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match unleash::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
