//! Device credential minting
//!
//! Produces the short-lived signed token the broker accepts in place of a
//! password. Claims are `{iat, exp, aud}` with the audience fixed to the
//! cloud project id. The private key is re-read from disk on every mint so
//! a key rotated in place is picked up at the next refresh without a
//! restart.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::config::BridgeConfig;

/// Credential minting errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Cannot read private key {path}: {source}")]
    KeyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported signing algorithm '{0}' (expected RS256 or ES256)")]
    UnsupportedAlgorithm(String),
    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Supported asymmetric signing schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Rs256,
    Es256,
}

impl SigningAlgorithm {
    /// Parse an algorithm name from configuration
    pub fn from_name(name: &str) -> Result<Self, CredentialError> {
        match name.to_uppercase().as_str() {
            "RS256" => Ok(SigningAlgorithm::Rs256),
            "ES256" => Ok(SigningAlgorithm::Es256),
            other => Err(CredentialError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Es256 => "ES256",
        }
    }

    fn to_jwt(self) -> Algorithm {
        match self {
            SigningAlgorithm::Rs256 => Algorithm::RS256,
            SigningAlgorithm::Es256 => Algorithm::ES256,
        }
    }
}

/// Signed token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceClaims {
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Audience, always the project id
    pub aud: String,
}

/// A minted credential. Immutable; replaced, never mutated, on refresh.
#[derive(Clone)]
pub struct DeviceCredential {
    /// The signed token, sent as the broker password
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub audience: String,
}

// Keep the signed token out of debug output and logs.
impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredential")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

/// Mints time-bounded signed credentials from the device private key.
/// Stateless between mints.
pub struct CredentialMinter {
    key_path: PathBuf,
    algorithm: SigningAlgorithm,
    audience: String,
    validity_minutes: u64,
}

impl CredentialMinter {
    pub fn new(
        key_path: impl Into<PathBuf>,
        algorithm: SigningAlgorithm,
        audience: impl Into<String>,
        validity_minutes: u64,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            algorithm,
            audience: audience.into(),
            validity_minutes,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, CredentialError> {
        let algorithm = SigningAlgorithm::from_name(&config.auth.algorithm)?;
        Ok(Self::new(
            &config.auth.private_key,
            algorithm,
            &config.device.project_id,
            config.auth.token_validity_minutes,
        ))
    }

    /// Mint a fresh credential valid from now for the configured window
    pub fn mint(&self) -> Result<DeviceCredential, CredentialError> {
        let key_pem = std::fs::read(&self.key_path).map_err(|source| CredentialError::KeyRead {
            path: self.key_path.display().to_string(),
            source,
        })?;

        let issued_at = Utc::now();
        let expires_at = issued_at + chrono::Duration::seconds(self.validity_minutes as i64 * 60);

        let claims = DeviceClaims {
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            aud: self.audience.clone(),
        };

        let encoding_key = match self.algorithm {
            SigningAlgorithm::Rs256 => EncodingKey::from_rsa_pem(&key_pem)?,
            SigningAlgorithm::Es256 => EncodingKey::from_ec_pem(&key_pem)?,
        };

        let token = encode(&Header::new(self.algorithm.to_jwt()), &claims, &encoding_key)?;

        debug!(
            algorithm = self.algorithm.as_str(),
            audience = %self.audience,
            expires_at = %expires_at,
            "minted device credential"
        );

        Ok(DeviceCredential {
            token,
            issued_at,
            expires_at,
            audience: self.audience.clone(),
        })
    }
}
