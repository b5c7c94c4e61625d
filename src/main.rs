use clap::Parser;
use svea::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
