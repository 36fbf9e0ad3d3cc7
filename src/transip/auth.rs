// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Request signing for TransIP token authentication.
//!
//! TransIP issues access tokens in exchange for a `POST /auth` whose JSON body is
//! signed with the account's RSA private key (PKCS#1 v1.5, SHA-512). The base64
//! signature travels in the `Signature` header.

use crate::constants::TRANSIP_NONCE_BYTES;
use crate::errors::CredentialError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA512};
use rustls::pki_types::PrivateKeyDer;
use std::fmt::Write as _;

/// RSA key used to sign authentication requests.
pub struct SigningKey {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("modulus_bits", &(self.key_pair.public().modulus_len() * 8))
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Parse a PEM encoded RSA private key (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidPrivateKey`] if no PEM private key is found,
    /// the key is not RSA, or ring rejects it.
    pub fn from_pem(pem: &[u8]) -> Result<Self, CredentialError> {
        let invalid = |reason: String| CredentialError::InvalidPrivateKey { reason };

        let der = rustls_pemfile::private_key(&mut &pem[..])
            .map_err(|e| invalid(format!("malformed PEM: {e}")))?
            .ok_or_else(|| invalid("no PEM private key found".to_string()))?;

        let key_pair = match der {
            PrivateKeyDer::Pkcs8(key) => RsaKeyPair::from_pkcs8(key.secret_pkcs8_der()),
            PrivateKeyDer::Pkcs1(key) => RsaKeyPair::from_der(key.secret_pkcs1_der()),
            PrivateKeyDer::Sec1(_) => {
                return Err(invalid("EC keys are not supported, expected RSA".to_string()))
            }
            _ => return Err(invalid("unsupported private key encoding".to_string())),
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Sign `message` and return the base64 encoded signature.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidPrivateKey`] if signing fails.
    pub fn sign(&self, message: &[u8]) -> Result<String, CredentialError> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA512, &self.rng, message, &mut signature)
            .map_err(|_| CredentialError::InvalidPrivateKey {
                reason: "signing failed".to_string(),
            })?;
        Ok(BASE64.encode(signature))
    }

    /// Generate a hex encoded single-use nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if the system random source fails.
    pub fn nonce(&self) -> anyhow::Result<String> {
        let mut bytes = [0u8; TRANSIP_NONCE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;

        let mut nonce = String::with_capacity(TRANSIP_NONCE_BYTES * 2);
        for byte in bytes {
            let _ = write!(nonce, "{byte:02x}");
        }
        Ok(nonce)
    }

    /// DER encoded `RSAPublicKey` matching this key.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        self.key_pair.public().as_ref()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
