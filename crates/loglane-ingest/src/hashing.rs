//! One-way hashing of client network addresses

use hmac::{Hmac, Mac};
use loglane_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// How client addresses are hashed before they are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpHashAlgorithm {
    /// HMAC-SHA256 keyed with the secret
    #[default]
    HmacSha256,
    /// SHA-256 over secret followed by address
    Sha256,
}

impl IpHashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpHashAlgorithm::HmacSha256 => "hmac-sha256",
            IpHashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for IpHashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpHashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hmac-sha256" | "hmac_sha256" => Ok(IpHashAlgorithm::HmacSha256),
            "sha256" => Ok(IpHashAlgorithm::Sha256),
            other => Err(Error::Config(format!(
                "Unknown IP hash algorithm '{}' (expected hmac-sha256 or sha256)",
                other
            ))),
        }
    }
}

/// Deterministic, keyed hasher for client addresses
///
/// The same address and secret always produce the same lowercase hex digest.
#[derive(Clone)]
pub struct IpHasher {
    algorithm: IpHashAlgorithm,
    secret: Vec<u8>,
}

impl IpHasher {
    /// # Errors
    /// - `Error::Config` if the secret is empty
    pub fn new(algorithm: IpHashAlgorithm, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("IP hash secret must not be empty".to_string()));
        }
        Ok(Self {
            algorithm,
            secret: secret.as_bytes().to_vec(),
        })
    }

    pub fn algorithm(&self) -> IpHashAlgorithm {
        self.algorithm
    }

    /// Hash a client address
    ///
    /// # Errors
    /// - `Error::Validation` if the address is empty
    pub fn hash(&self, address: &str) -> Result<String> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Validation(
                "client address must not be empty".to_string(),
            ));
        }

        let digest = match self.algorithm {
            IpHashAlgorithm::HmacSha256 => {
                let mut mac = HmacSha256::new_from_slice(&self.secret)
                    .map_err(|e| Error::Config(format!("Invalid IP hash key: {}", e)))?;
                mac.update(address.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            IpHashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(&self.secret);
                hasher.update(address.as_bytes());
                hasher.finalize().to_vec()
            }
        };

        Ok(hex::encode(digest))
    }
}

// The secret never appears in debug output.
impl fmt::Debug for IpHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpHasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
