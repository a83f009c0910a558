//! tracewrap CLI entrypoint.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

mod commands;
mod config;
mod executor;
mod handlers;

use commands::Commands;
use config::CliConfig;
use tracewrap_runner::ExecResult;

#[derive(Parser)]
#[command(
    name = "tracewrap",
    version,
    about = "Wrap commands in OpenTelemetry spans enriched with CI metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let config = CliConfig::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not load configuration; using defaults");
        CliConfig::default()
    });

    let result = match cli.command {
        Commands::Exec { command } => {
            handlers::exec(&config, &command, None, None, false).await
        }
        Commands::Execf {
            span_name,
            service_name,
            trace_boundary,
            tag_command_args,
            command,
        } => {
            let mut config = config.clone();
            if trace_boundary.is_some() {
                // Reserved: recorded in the effective config, not yet
                // consumed by span creation.
                config.trace_boundary = trace_boundary;
            }
            handlers::exec(&config, &command, span_name, service_name, tag_command_args).await
        }
        Commands::Detect => {
            handlers::detect_environment(&config);
            ExecResult {
                exit_code: 0,
                error: None,
            }
        }
    };

    if let Some(error) = &result.error {
        if error.is_reportable() {
            eprintln!("{error}");
        }
    }
    std::process::exit(result.exit_code);
}

/// Diagnostics go to stderr so the child's stdout passes through clean;
/// the default filter keeps stderr quiet unless something is actually
/// wrong.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
