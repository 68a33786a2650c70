use std::process;

use clap::Parser;
use pr_validator::cli::usage_exit_code;
use pr_validator::Cli;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = usage_exit_code(&e);
            let _ = e.print();
            process::exit(code);
        }
    };

    // RUST_LOG wins; otherwise "warn", or "info" with --verbose.
    // Logs go to stderr so they don't interleave with the progress output.
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.execute() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");

            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }

            process::exit(1);
        }
    }
}
