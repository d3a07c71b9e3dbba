pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod model;
pub mod secret;

pub use client::{DnsUpdateClient, Rfc2136Client};
pub use coordinator::Coordinator;
pub use error::{ClientError, SecretError, SolverError};
pub use handler::{ChallengeRequest, Handler, SOLVER_NAME};
pub use secret::{SecretStore, StaticSecretStore};
