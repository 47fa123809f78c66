//! stagewright CLI: resolve, template and run CI stages.

use clap::Parser;

fn main() {
    let cli = stagewright::cli::Cli::parse();
    if let Err(e) = stagewright::cli::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
