//! Error types for tracewrap.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Process errors
    #[error("{program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command exited with code {0}")]
    NonZeroExit(i32),

    // Telemetry errors
    #[error("could not create span exporter: {0}")]
    Exporter(String),

    // Configuration errors
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error should be printed on stderr before exiting.
    ///
    /// A plain non-zero exit is already visible through the exit code, so
    /// re-printing it would only add noise.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Error::NonZeroExit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_message_has_no_internal_prefix() {
        let err = Error::Launch {
            program: "no-such-tool".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let message = err.to_string();
        assert!(message.starts_with("no-such-tool: "));
        assert!(!message.contains("fork"));
        assert!(!message.contains("exec"));
    }

    #[test]
    fn non_zero_exit_is_not_reportable() {
        assert!(!Error::NonZeroExit(3).is_reportable());
        assert!(
            Error::Launch {
                program: "x".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .is_reportable()
        );
    }
}
