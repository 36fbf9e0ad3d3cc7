// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-issuer solver configuration.
//!
//! cert-manager passes the `config` block of the issuer's webhook solver verbatim
//! with every challenge. It is decoded on each call and never cached, so edits to
//! the issuer take effect on the next challenge.
//!
//! ```yaml
//! solvers:
//!   - dns01:
//!       webhook:
//!         groupName: acme.example.com
//!         solverName: transip
//!         config:
//!           accountName: my-account
//!           ttl: 300
//!           privateKeySecretRef:
//!             name: transip-credentials
//!             key: privateKey
//! ```

use crate::constants::DEFAULT_RECORD_TTL_SECS;
use crate::errors::ConfigError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reference to one key of a `Secret` in the challenge's namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretKeyRef {
    /// Name of the secret
    #[serde(default)]
    pub name: String,
    /// Key within the secret's data
    #[serde(default)]
    pub key: String,
}

/// Decoded solver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransipConfig {
    /// TransIP account (login) name
    #[serde(default)]
    pub account_name: String,

    /// Inline PEM private key; base64 encoded in JSON
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub private_key: Vec<u8>,

    /// Secret holding the PEM private key, used when `private_key` is empty
    #[serde(default)]
    pub private_key_secret_ref: SecretKeyRef,

    /// TTL in seconds of the challenge record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl TransipConfig {
    /// TTL to put on the challenge record.
    ///
    /// Zero or absent falls back to [`DEFAULT_RECORD_TTL_SECS`].
    #[must_use]
    pub fn record_ttl(&self) -> u32 {
        match self.ttl {
            Some(ttl) if ttl > 0 => ttl,
            _ => DEFAULT_RECORD_TTL_SECS,
        }
    }

    /// Check that the fields needed to reach TransIP are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `accountName` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "accountName",
            });
        }
        Ok(())
    }
}

/// Decode the raw solver config attached to a challenge.
///
/// A missing or `null` config yields the default configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Decode`] if the JSON does not match the schema.
pub fn load_config(raw: Option<&serde_json::Value>) -> Result<TransipConfig, ConfigError> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(TransipConfig::default()),
        Some(value) => {
            TransipConfig::deserialize(value).map_err(|e| ConfigError::Decode {
                reason: e.to_string(),
            })
        }
    }
}

/// `[]byte`-style JSON encoding: a base64 string, with `null` meaning empty.
mod base64_bytes {
    use super::{Deserialize, Deserializer, Engine, Serializer, BASE64};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            None => Ok(Vec::new()),
            Some(s) => BASE64
                .decode(s.trim())
                .map_err(|e| serde::de::Error::custom(format!("privateKey: {e}"))),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
