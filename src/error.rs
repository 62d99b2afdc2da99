// ABOUTME: Error types for the dump engine
// ABOUTME: Distinguishes configuration mistakes from transport failures

use thiserror::Error;

/// Errors surfaced by a dump invocation.
///
/// `Configuration` and `MissingDatabase` are raised eagerly, before any
/// query executes. Everything coming out of the connection, cursor, or sink
/// mid-stream is a `Transport` error and terminates the dump; output already
/// flushed to the destination is left in place.
#[derive(Debug, Error)]
pub enum DumpError {
    /// Mutually exclusive or nonsensical option values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No database is selected on the connection.
    #[error("no database selected; execute `USE <database>` before dumping")]
    MissingDatabase,

    /// I/O failure from the connection, cursor, or output sink.
    /// Displays the full context chain of the underlying error.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),
}

pub type Result<T, E = DumpError> = std::result::Result<T, E>;

impl From<anyhow::Error> for DumpError {
    fn from(err: anyhow::Error) -> Self {
        DumpError::Transport(err)
    }
}

impl From<mysql_async::Error> for DumpError {
    fn from(err: mysql_async::Error) -> Self {
        DumpError::Transport(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for DumpError {
    fn from(err: std::io::Error) -> Self {
        DumpError::Transport(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(err: serde_json::Error) -> Self {
        DumpError::Transport(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_mentions_the_problem() {
        let err = DumpError::Configuration("use only one of include/exclude".into());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("include/exclude"));
    }

    #[test]
    fn transport_error_keeps_context_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DumpError = anyhow::Error::new(io).context("writing dump file").into();
        let text = err.to_string();
        assert!(text.contains("writing dump file"));
        assert!(text.contains("denied"));
    }
}
