use std::fmt;

use thiserror::Error;

/// Per-server failure recorded by the [`crate::coordinator::Coordinator`].
///
/// Carries the server address alongside the cause so an operator can tell
/// which of N servers failed and why, without the TSIG secret ever being
/// part of the message.
#[derive(Debug, Clone)]
pub struct ServerFailure {
    pub server: String,
    pub cause: ClientError,
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.server, self.cause)
    }
}

/// A list of [`ServerFailure`] with a `Display` impl joining them for
/// embedding in [`SolverError::QuorumNotMet`].
#[derive(Debug, Clone, Default)]
pub struct Failures(pub Vec<ServerFailure>);

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Errors surfaced by a single [`crate::client::DnsUpdateClient`] call.
///
/// These never propagate past the `Coordinator` on their own; they are
/// folded into a [`ServerFailure`] and, in aggregate, a
/// [`SolverError::QuorumNotMet`].
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("transport error: {0}")]
    SendFailure(String),

    #[error("authentication failure: {0}")]
    AuthFailure(String),

    #[error("update rejected: {mnemonic} ({code})")]
    UpdateRejected { code: u16, mnemonic: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from the `SecretStore` collaborator (see spec.md §6).
#[derive(Error, Debug, Clone)]
pub enum SecretError {
    #[error("secret {name:?} not found in namespace {namespace:?}")]
    NotFound { namespace: String, name: String },

    #[error("secret {name:?} has no key {key:?}")]
    KeyMissing { name: String, key: String },

    #[error("secret store not initialized; call initialize() before present()/clean_up()")]
    ClientNotInitialized,
}

/// Top-level error returned to the certificate-management controller.
#[derive(Error, Debug, Clone)]
pub enum SolverError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("secret unavailable: {0}")]
    SecretUnavailable(#[from] SecretError),

    #[error(
        "quorum not met: {succeeded}/{attempted} servers succeeded (needed {required}); failures: {failures}"
    )]
    QuorumNotMet {
        succeeded: usize,
        attempted: usize,
        required: usize,
        failures: Failures,
    },
}
