use hickory_client::rr::Name;
use serde_derive::Deserialize;

use crate::error::SolverError;
use crate::model::{self, TsigAlgorithmKind, DEFAULT_TTL};

/// The JSON-equivalent challenge-solver configuration document, spec.md §6.
#[derive(Debug, Deserialize)]
pub struct SolverConfig {
    pub servers: Vec<String>,
    pub zone: String,
    #[serde(rename = "tsigKeyName")]
    pub tsig_key_name: String,
    #[serde(rename = "tsigAlgorithm")]
    pub tsig_algorithm: Option<String>,
    #[serde(rename = "tsigSecretName")]
    pub tsig_secret_name: String,
    #[serde(rename = "tsigSecretKey")]
    pub tsig_secret_key: Option<String>,
    pub ttl: Option<u32>,
}

/// `SolverConfig` after defaulting and structural validation, with names
/// parsed into `hickory_client::rr::Name`. Does not yet carry the TSIG
/// secret bytes — those are resolved separately via `SecretStore`.
#[derive(Debug)]
pub struct ValidatedConfig {
    pub servers: Vec<String>,
    pub zone: Name,
    pub key_name: Name,
    pub algorithm: TsigAlgorithmKind,
    pub secret_name: String,
    pub secret_key: String,
    pub ttl: u32,
}

impl SolverConfig {
    /// Parses the opaque configuration blob a `ChallengeRequest` carries.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `value` does not match the configuration schema
    /// (missing required field, or a field of the wrong type).
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SolverError> {
        serde_json::from_value(value.clone())
            .map_err(|e| SolverError::ConfigInvalid(format!("malformed configuration: {e}")))
    }

    /// Applies defaults (§6: `tsigAlgorithm` default `hmac-sha256`,
    /// `tsigSecretKey` default `secret`, `ttl` default 60) and rejects an
    /// empty server list or an unrecognized algorithm mnemonic, all before
    /// any network I/O or secret lookup is attempted (§8 property 7).
    ///
    /// # Errors
    ///
    /// Will return `Err` if
    ///
    /// - `servers`, `zone`, `tsigKeyName`, or `tsigSecretName` is empty.
    /// - `tsigAlgorithm` is set to an unrecognized mnemonic.
    /// - `zone` or `tsigKeyName` fails to parse as a DNS name.
    pub fn validate(self) -> Result<ValidatedConfig, SolverError> {
        if self.servers.is_empty() {
            return Err(SolverError::ConfigInvalid("servers must not be empty".into()));
        }
        if self.zone.trim().is_empty() {
            return Err(SolverError::ConfigInvalid("zone must not be empty".into()));
        }
        if self.tsig_key_name.trim().is_empty() {
            return Err(SolverError::ConfigInvalid("tsigKeyName must not be empty".into()));
        }
        if self.tsig_secret_name.trim().is_empty() {
            return Err(SolverError::ConfigInvalid("tsigSecretName must not be empty".into()));
        }

        let algorithm_raw = self.tsig_algorithm.as_deref().unwrap_or("hmac-sha256");
        let algorithm = TsigAlgorithmKind::parse(algorithm_raw)
            .ok_or_else(|| SolverError::ConfigInvalid(format!("unrecognized tsigAlgorithm {algorithm_raw:?}")))?;

        let zone = model::normalize_name(&self.zone)?;
        let key_name = model::normalize_name(&self.tsig_key_name)?;

        Ok(ValidatedConfig {
            servers: self.servers,
            zone,
            key_name,
            algorithm,
            secret_name: self.tsig_secret_name,
            secret_key: self.tsig_secret_key.unwrap_or_else(|| "secret".to_string()),
            ttl: self.ttl.unwrap_or(DEFAULT_TTL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_servers_is_config_invalid() {
        let value = json!({
            "zone": "example.com",
            "tsigKeyName": "k",
            "tsigSecretName": "s",
        });
        let err = SolverConfig::from_value(&value).unwrap().validate().unwrap_err();
        assert!(matches!(err, SolverError::ConfigInvalid(_)));
    }

    #[test]
    fn empty_servers_is_config_invalid() {
        let value = json!({
            "servers": [],
            "zone": "example.com",
            "tsigKeyName": "k",
            "tsigSecretName": "s",
        });
        let err = SolverConfig::from_value(&value).unwrap().validate().unwrap_err();
        assert!(matches!(err, SolverError::ConfigInvalid(_)));
    }

    #[test]
    fn defaults_applied() {
        let value = json!({
            "servers": ["10.0.0.1"],
            "zone": "example.com",
            "tsigKeyName": "k",
            "tsigSecretName": "s",
        });
        let validated = SolverConfig::from_value(&value).unwrap().validate().unwrap();
        assert_eq!(validated.algorithm, TsigAlgorithmKind::HmacSha256);
        assert_eq!(validated.secret_key, "secret");
        assert_eq!(validated.ttl, 60);
        assert_eq!(validated.zone.to_string(), "example.com.");
    }

    #[test]
    fn unrecognized_algorithm_is_config_invalid() {
        let value = json!({
            "servers": ["10.0.0.1"],
            "zone": "example.com",
            "tsigKeyName": "k",
            "tsigSecretName": "s",
            "tsigAlgorithm": "hmac-sha3",
        });
        let err = SolverConfig::from_value(&value).unwrap().validate().unwrap_err();
        assert!(matches!(err, SolverError::ConfigInvalid(_)));
    }
}
