use bevy_landscape_preprocess::prelude::*;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Cli::parse();

    let result = PreprocessContext::from_cli(args).and_then(|context| preprocess(&context));

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Preprocessing failed: {error}");
            ExitCode::FAILURE
        }
    }
}
