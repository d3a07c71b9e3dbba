use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{DnsUpdateClient, Rfc2136Client};
use crate::config::SolverConfig;
use crate::coordinator::Coordinator;
use crate::error::SolverError;
use crate::model::{self, TsigCredentials, DEFAULT_CLIENT_TIMEOUT_SECS};
use crate::secret::SecretStore;

/// The advertised solver identifier (spec.md §4.3).
pub const SOLVER_NAME: &str = "multi-dns";

/// Inbound request from the solver-registration layer (spec.md §6).
/// `config` is the opaque JSON document described in §6's configuration
/// schema table.
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    pub resolved_fqdn: String,
    pub key: String,
    pub resource_namespace: String,
    pub config: Value,
}

/// Translates one ACME challenge request into a fan-out mutation: parses and
/// validates configuration, resolves the TSIG secret, and drives a
/// [`Coordinator`]. Must be [`Handler::initialize`]d before `present`/`clean_up`.
pub struct Handler {
    secret_store: Option<Arc<dyn SecretStore>>,
}

/// Everything a mutation needs to run, assembled once so `present`/`clean_up`
/// don't reparse the configuration they already validated.
struct BuiltCoordinator {
    coordinator: Coordinator,
    fqdn: hickory_client::rr::Name,
    ttl: u32,
    server_count: usize,
}

impl Default for Handler {
    fn default() -> Self {
        Handler::new()
    }
}

impl Handler {
    pub fn new() -> Self {
        Handler { secret_store: None }
    }

    pub fn name(&self) -> &'static str {
        SOLVER_NAME
    }

    /// Installs the secret-lookup collaborator. Must be called once before
    /// `present`/`clean_up`.
    pub fn initialize(&mut self, secret_store: Arc<dyn SecretStore>) {
        self.secret_store = Some(secret_store);
    }

    /// # Errors
    ///
    /// Will return `Err` if
    ///
    /// - `request.config` fails to parse or validate.
    /// - `request.resolved_fqdn` does not lie within the configured zone.
    /// - the TSIG secret cannot be resolved (not initialized, not found, or
    ///   missing the configured key).
    /// - fewer than a majority of servers succeed.
    pub async fn present(&self, request: &ChallengeRequest) -> Result<(), SolverError> {
        let built = self.build_coordinator(request).await?;
        let started = Instant::now();
        info!(
            "present: fqdn={} namespace={} servers={}",
            request.resolved_fqdn, request.resource_namespace, built.server_count
        );
        let result = built
            .coordinator
            .add_txt_all(CancellationToken::new(), built.fqdn, request.key.clone(), built.ttl)
            .await;
        log_outcome("present", &request.resolved_fqdn, &result, started);
        result
    }

    /// # Errors
    ///
    /// Will return `Err` if
    ///
    /// - `request.config` fails to parse or validate.
    /// - `request.resolved_fqdn` does not lie within the configured zone.
    /// - the TSIG secret cannot be resolved (not initialized, not found, or
    ///   missing the configured key).
    /// - every configured server fails.
    pub async fn clean_up(&self, request: &ChallengeRequest) -> Result<(), SolverError> {
        let built = self.build_coordinator(request).await?;
        let started = Instant::now();
        info!(
            "clean_up: fqdn={} namespace={} servers={}",
            request.resolved_fqdn, request.resource_namespace, built.server_count
        );
        let result = built.coordinator.delete_txt_all(CancellationToken::new(), built.fqdn).await;
        log_outcome("clean_up", &request.resolved_fqdn, &result, started);
        result
    }

    /// Parses configuration, resolves the FQDN, fetches the secret, and
    /// assembles the per-server clients — everything a mutation needs short
    /// of actually dispatching it. Configuration and secret errors short-
    /// circuit here, before any network I/O (spec.md §8 property 7).
    async fn build_coordinator(&self, request: &ChallengeRequest) -> Result<BuiltCoordinator, SolverError> {
        let validated = SolverConfig::from_value(&request.config)?.validate()?;

        let fqdn = model::normalize_name(&request.resolved_fqdn)?;
        if !model::fqdn_in_zone(&fqdn, &validated.zone) {
            return Err(SolverError::ConfigInvalid(format!(
                "{} does not lie within zone {}",
                request.resolved_fqdn, validated.zone
            )));
        }

        let secret_store = self
            .secret_store
            .as_ref()
            .ok_or(SolverError::SecretUnavailable(crate::error::SecretError::ClientNotInitialized))?;
        let secret = secret_store
            .get_secret(&request.resource_namespace, &validated.secret_name, &validated.secret_key)
            .await?;

        let credentials = Arc::new(TsigCredentials::new(validated.key_name, validated.algorithm, secret));
        let timeout = Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS);
        let server_count = validated.servers.len();

        let targets: Vec<(String, Arc<dyn DnsUpdateClient>)> = validated
            .servers
            .into_iter()
            .map(|server| {
                let client = Rfc2136Client::new(server.clone(), validated.zone.clone(), Arc::clone(&credentials), timeout);
                (server, Arc::new(client) as Arc<dyn DnsUpdateClient>)
            })
            .collect();

        let coordinator = Coordinator::new(targets)?;
        Ok(BuiltCoordinator {
            coordinator,
            fqdn,
            ttl: validated.ttl,
            server_count,
        })
    }
}

fn log_outcome(op: &str, fqdn: &str, result: &Result<(), SolverError>, started: Instant) {
    let elapsed = started.elapsed();
    match result {
        Ok(()) => info!("{op}: fqdn={fqdn} outcome=success duration={elapsed:?}"),
        Err(e) => info!("{op}: fqdn={fqdn} outcome=failure duration={elapsed:?} cause={e}"),
    }
}
