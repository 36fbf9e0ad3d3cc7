// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # cert-manager webhook for TransIP
//!
//! An ACME DNS-01 solver for [cert-manager](https://cert-manager.io) that publishes
//! challenge TXT records through the TransIP REST API.
//!
//! ## Overview
//!
//! cert-manager calls the webhook once to present a challenge record and once to
//! clean it up. For each call the webhook:
//!
//! 1. finds the authoritative zone of the challenge name with recursive SOA
//!    queries, falling back to the zone cert-manager supplied,
//! 2. decodes the per-issuer solver config and resolves the TransIP private key,
//!    inline or from a Kubernetes `Secret`,
//! 3. authenticates against TransIP and adds or removes exactly one TXT entry.
//!
//! ## Modules
//!
//! - [`server`] - Webhook API routes, discovery and TLS serving
//! - [`solver`] - The solver contract and the TransIP solver
//! - [`challenge`] - `ChallengePayload` wire types
//! - [`config`] - Per-issuer solver configuration
//! - [`credentials`] - Private key resolution
//! - [`transip`] - TransIP REST API client and request signing
//! - [`zone`] - Authoritative zone discovery and record naming
//! - [`errors`] / [`status_reasons`] - Typed errors and their Kubernetes status reasons
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use cert_manager_webhook_transip::solver::{Solver, TransipSolver};
//! use cert_manager_webhook_transip::zone::{recursive_nameservers, SoaZoneResolver};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let resolver = Arc::new(SoaZoneResolver::new(recursive_nameservers(&[])?));
//! let solver = TransipSolver::new("https://api.transip.nl/v6", resolver)?;
//! assert_eq!(solver.name(), "transip");
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod cli;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod errors;
pub mod metrics;
pub mod server;
pub mod solver;
pub mod status_reasons;
pub mod transip;
pub mod zone;
