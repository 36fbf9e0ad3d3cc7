// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The DNS-01 solver contract.
//!
//! A webhook deployment serves one or more solvers under a single API group.
//! cert-manager selects a solver by [`Solver::name`] (the `solverName` of the
//! issuer's webhook config) and calls [`Solver::present`] / [`Solver::cleanup`]
//! for each challenge. [`Solver::initialize`] runs once at startup.
//!
//! Implementations must tolerate `present` being called several times with the
//! same challenge, and `cleanup` must only remove the record carrying the
//! challenge's own key so concurrent validations of one name do not interfere.

pub mod transip;

pub use transip::TransipSolver;

use crate::challenge::ChallengeRequest;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

/// Receiver that flips to `true` when the webhook is shutting down.
pub type ShutdownSignal = watch::Receiver<bool>;

/// A named DNS-01 challenge solver.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Name used by issuers to select this solver.
    fn name(&self) -> &str;

    /// Prepare the solver: build API clients, warm caches.
    ///
    /// `kube_config` points at the cluster the webhook runs in; `shutdown` fires
    /// when the process receives SIGTERM/SIGINT.
    async fn initialize(&self, kube_config: kube::Config, shutdown: ShutdownSignal)
        -> Result<()>;

    /// Create the TXT record for `challenge`.
    async fn present(&self, challenge: &ChallengeRequest) -> Result<()>;

    /// Remove the TXT record for `challenge`.
    async fn cleanup(&self, challenge: &ChallengeRequest) -> Result<()>;
}
