use clap::Parser;
use iamrisk_cli::Cli;

fn main() {
    // stdout carries reports and JSON; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "iamrisk starting");

    let cli = Cli::parse();
    std::process::exit(cli.run());
}
