use apigen::cli::{run, Cli};
use apigen::telemetry::{init_logging, LogConfig};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Warning: {e:#}");
    }

    let mut stdout = std::io::stdout().lock();
    match run(&cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(exit_code = code.code(), error = %e, "apigen failed");
            eprintln!("Error: {e}");
            ExitCode::from(code.code())
        }
    }
}
