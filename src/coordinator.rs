use std::sync::Arc;

use hickory_client::rr::Name;
use log::{info, warn};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::DnsUpdateClient;
use crate::error::{ClientError, Failures, ServerFailure, SolverError};

/// The mutation a `Coordinator` fans out, in the shape each per-server task
/// needs to drive its `DnsUpdateClient` call.
#[derive(Clone)]
enum FanoutOp {
    AddTxt { value: String, ttl: u32 },
    DeleteTxt,
}

/// Fans one logical mutation out to every configured server concurrently
/// and reduces the per-server outcomes under a quorum rule (spec.md §4.2).
///
/// Single-use: `add_txt_all`/`delete_txt_all` consume `self`, matching the
/// "a Coordinator instance serves exactly one Mutation Request" invariant.
pub struct Coordinator {
    targets: Vec<(String, Arc<dyn DnsUpdateClient>)>,
}

impl Coordinator {
    /// `targets` must be non-empty; an empty list is a configuration error
    /// surfaced before any I/O (spec.md §3 invariant).
    ///
    /// # Errors
    ///
    /// Will return `Err` if `targets` is empty.
    pub fn new(targets: Vec<(String, Arc<dyn DnsUpdateClient>)>) -> Result<Self, SolverError> {
        if targets.is_empty() {
            return Err(SolverError::ConfigInvalid("servers list must not be empty".into()));
        }
        Ok(Coordinator { targets })
    }

    /// Strict majority: `floor(N/2) + 1`.
    fn add_threshold(&self) -> usize {
        self.targets.len() / 2 + 1
    }

    /// At-least-one, per spec.md §4.2's asymmetric quorum rule for CleanUp.
    fn delete_threshold(&self) -> usize {
        1
    }

    /// # Errors
    ///
    /// Will return `Err(SolverError::QuorumNotMet)` if fewer than the
    /// majority threshold of servers succeed, naming every failing server
    /// and its cause.
    pub async fn add_txt_all(
        self,
        cancel: CancellationToken,
        fqdn: Name,
        value: String,
        ttl: u32,
    ) -> Result<(), SolverError> {
        let threshold = self.add_threshold();
        self.run(cancel, fqdn, FanoutOp::AddTxt { value, ttl }, threshold).await
    }

    /// # Errors
    ///
    /// Will return `Err(SolverError::QuorumNotMet)` if every server fails.
    pub async fn delete_txt_all(self, cancel: CancellationToken, fqdn: Name) -> Result<(), SolverError> {
        let threshold = self.delete_threshold();
        self.run(cancel, fqdn, FanoutOp::DeleteTxt, threshold).await
    }

    async fn run(
        self,
        cancel: CancellationToken,
        fqdn: Name,
        op: FanoutOp,
        threshold: usize,
    ) -> Result<(), SolverError> {
        let attempted = self.targets.len();
        let mut set = JoinSet::new();
        for (server, client) in self.targets {
            let cancel = cancel.clone();
            let fqdn = fqdn.clone();
            let op = op.clone();
            set.spawn(async move {
                let result = match op {
                    FanoutOp::AddTxt { value, ttl } => client.add_txt(cancel, &fqdn, &value, ttl).await,
                    FanoutOp::DeleteTxt => client.delete_txt(cancel, &fqdn).await,
                };
                (server, result)
            });
        }

        let mut succeeded = 0usize;
        let mut failures = Vec::new();
        // No early exit: every server is attempted and awaited even once the
        // quorum is already decided, so the operator gets a complete picture.
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_server, Ok(()))) => succeeded += 1,
                Ok((server, Err(cause))) => {
                    warn!("{server}: update failed: {cause}");
                    failures.push(ServerFailure { server, cause });
                }
                Err(join_err) => failures.push(ServerFailure {
                    server: "<unknown>".to_string(),
                    cause: ClientError::SendFailure(format!("task panicked: {join_err}")),
                }),
            }
        }

        if succeeded >= threshold {
            info!("quorum met: {succeeded}/{attempted} servers succeeded (needed {threshold})");
            Ok(())
        } else {
            Err(SolverError::QuorumNotMet {
                succeeded,
                attempted,
                required: threshold,
                failures: Failures(failures),
            })
        }
    }
}
