use std::fmt;
use std::str::FromStr;

use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::Name;

use crate::error::SolverError;

/// Default per-call client timeout (spec.md §4.1).
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 10;
/// Default TXT record TTL when the configuration omits one (spec.md §3).
pub const DEFAULT_TTL: u32 = 60;
/// TSIG fudge window, per RFC 8945 and spec.md §4.1.
pub const TSIG_FUDGE_SECS: u16 = 300;

/// The four TSIG MAC algorithms spec.md §3 recognizes. `HmacSha1` and
/// `HmacMd5` are accepted for interop with legacy servers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsigAlgorithmKind {
    HmacSha256,
    HmacSha512,
    HmacSha1,
    HmacMd5,
}

impl TsigAlgorithmKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hmac-sha256" => Some(Self::HmacSha256),
            "hmac-sha512" => Some(Self::HmacSha512),
            "hmac-sha1" => Some(Self::HmacSha1),
            "hmac-md5" => Some(Self::HmacMd5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha512 => "hmac-sha512",
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacMd5 => "hmac-md5",
        }
    }

    /// Maps onto `hickory_client`'s own algorithm identifier, used to build
    /// the `TSigner` inside [`crate::client::Rfc2136Client`].
    pub fn to_hickory(self) -> TsigAlgorithm {
        match self {
            Self::HmacSha256 => TsigAlgorithm::HmacSha256,
            Self::HmacSha512 => TsigAlgorithm::HmacSha512,
            Self::HmacSha1 => TsigAlgorithm::HmacSha1,
            Self::HmacMd5 => TsigAlgorithm::HmacMd5,
        }
    }
}

impl fmt::Display for TsigAlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The TSIG key material for one mutation.
///
/// `Debug` is hand-written so `secret` never leaks through `{:?}` — logging
/// or erroring with `credentials` directly must never reveal it (spec.md §3,
/// §8 property 6).
pub struct TsigCredentials {
    pub key_name: Name,
    pub algorithm: TsigAlgorithmKind,
    pub secret: Vec<u8>,
}

impl TsigCredentials {
    pub fn new(key_name: Name, algorithm: TsigAlgorithmKind, secret: Vec<u8>) -> Self {
        TsigCredentials {
            key_name,
            algorithm,
            secret,
        }
    }
}

impl fmt::Debug for TsigCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigCredentials")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Normalizes a name to FQDN (trailing-dot) form and parses it.
///
/// # Errors
///
/// Will return `Err` if `raw` is not a valid DNS name.
pub fn normalize_name(raw: &str) -> Result<Name, SolverError> {
    let fqdn = if raw.ends_with('.') {
        raw.to_string()
    } else {
        format!("{raw}.")
    };
    Name::from_str(&fqdn).map_err(|e| SolverError::ConfigInvalid(format!("invalid name {raw:?}: {e}")))
}

/// Checks that `fqdn` lies within `zone`, i.e. `zone` is a suffix of `fqdn`
/// after normalization (spec.md §3 invariant).
pub fn fqdn_in_zone(fqdn: &Name, zone: &Name) -> bool {
    zone.zone_of(fqdn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_trailing_dot() {
        let name = normalize_name("example.com").unwrap();
        assert_eq!(name.to_string(), "example.com.");
    }

    #[test]
    fn normalize_is_idempotent_on_trailing_dot() {
        let name = normalize_name("example.com.").unwrap();
        assert_eq!(name.to_string(), "example.com.");
    }

    #[test]
    fn fqdn_within_zone() {
        let zone = normalize_name("example.com").unwrap();
        let fqdn = normalize_name("_acme-challenge.app.example.com").unwrap();
        assert!(fqdn_in_zone(&fqdn, &zone));
    }

    #[test]
    fn fqdn_outside_zone() {
        let zone = normalize_name("example.com").unwrap();
        let fqdn = normalize_name("_acme-challenge.other.org").unwrap();
        assert!(!fqdn_in_zone(&fqdn, &zone));
    }

    #[test]
    fn algorithm_kind_round_trips_through_str() {
        for raw in ["hmac-sha256", "hmac-sha512", "hmac-sha1", "hmac-md5"] {
            let kind = TsigAlgorithmKind::parse(raw).unwrap();
            assert_eq!(kind.as_str(), raw);
        }
        assert!(TsigAlgorithmKind::parse("hmac-sha3").is_none());
    }

    #[test]
    fn credentials_debug_never_prints_secret() {
        let creds = TsigCredentials::new(
            normalize_name("key.example.com").unwrap(),
            TsigAlgorithmKind::HmacSha256,
            b"super-secret-bytes".to_vec(),
        );
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret-bytes"));
        assert!(rendered.contains("redacted"));
    }
}
