//! CLI command definitions.

use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command wrapped in a CI-aware trace span
    ///
    /// The command is launched with inherited stdio and its exit code is
    /// mirrored. The wrapping span's W3C traceparent is passed to the child
    /// through the TRACEPARENT environment variable. No flags are parsed
    /// after `exec`; everything goes to the child verbatim.
    ///
    /// Examples:
    ///
    ///   tracewrap exec curl https://example.com
    ///
    ///   tracewrap exec /bin/sh -c 'tracewrap exec make test && sleep 1'
    ///
    ///   TRACEWRAP_SERVICE_NAME=foo tracewrap exec make build
    #[command(disable_help_flag = true)]
    Exec {
        /// Command and arguments, passed to the child untouched
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Run a command with wrapper flags (separate the command with `--`)
    ///
    /// Examples:
    ///
    ///   tracewrap execf --service-name foo -- curl https://example.com
    ///
    ///   tracewrap execf --span-name bar -- make test
    Execf {
        /// Name of the span
        #[arg(short = 's', long)]
        span_name: Option<String>,

        /// Name of the service
        #[arg(short = 'n', long)]
        service_name: Option<String>,

        /// Limit the trace to a pipeline or job
        #[arg(short = 't', long, value_enum)]
        trace_boundary: Option<TraceBoundary>,

        /// Tag the span with the full command argument list
        #[arg(long)]
        tag_command_args: bool,

        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Detect the CI environment and print the effective configuration
    Detect,
}

/// Scope selector for trace grouping. Reserved: parsed, carried through
/// configuration and shown by `detect`, but not yet consumed by span
/// creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TraceBoundary {
    Pipeline,
    Job,
}
