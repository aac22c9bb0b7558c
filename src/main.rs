// CLASSIFICATION: COMMUNITY
// Filename: main.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Entry point for the soaap checker binary.

use clap::Parser;
use soaap::cli::{self, Cli};

fn main() {
    env_logger::init();
    let args = Cli::parse();
    match cli::run(&args) {
        Ok(report) => print!("{}", report),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}
