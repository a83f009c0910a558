//! Subcommand handlers.

use crate::config::CliConfig;
use crate::executor::{self, ExecOptions};
use tracewrap_runner::ExecResult;

/// `exec`/`execf`: wrap the command in a span, mirror its exit.
///
/// Flag values beat configuration; configuration beats the detected
/// descriptor (applied later, in the executor).
pub async fn exec(
    config: &CliConfig,
    command: &[String],
    span_name: Option<String>,
    service_name: Option<String>,
    tag_command_args: bool,
) -> ExecResult {
    let options = ExecOptions {
        service_name: service_name.or_else(|| config.service_name.clone()),
        span_name: span_name.or_else(|| config.span_name.clone()),
        tag_command_args: tag_command_args || config.tag_command_args,
    };
    executor::run(command, &options).await
}

/// `detect`: print the effective configuration and the classified CI
/// environment.
pub fn detect_environment(config: &CliConfig) {
    let descriptor = tracewrap_core::detect();

    match serde_yaml::to_string(config) {
        Ok(rendered) => println!("Config:\n{rendered}"),
        Err(err) => eprintln!("could not render config: {err}"),
    }

    println!("CI settings:");
    println!("  provider: {}", descriptor.name);
    println!("  service name: {}", descriptor.service_name);
    println!("  span name: {}", descriptor.span_name);
    println!("  trace seed: {}", descriptor.trace_seed);
    println!("  span seed: {}", descriptor.span_seed);
    println!("  attributes:");
    for (key, value) in &descriptor.attributes {
        println!("    {key}: {value}");
    }
}
