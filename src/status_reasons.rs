// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes `Status` reasons reported back to cert-manager.
//!
//! When a challenge fails, the webhook answers with `success: false` and a
//! `metav1.Status` whose `reason` field is one of the well-known Kubernetes
//! `StatusReason` values below. cert-manager surfaces the message on the
//! `Challenge` resource and owns the retry policy.
//!
//! # Example Response
//!
//! ```yaml
//! response:
//!   uid: 0b4e0b8c-5c6f-4a57-a1a1-2c4b1f9e7a10
//!   success: false
//!   status:
//!     status: Failure
//!     reason: Unauthorized
//!     code: 401
//!     message: "TransIP API returned HTTP 401: Signature could not be verified"
//! ```

/// Value of `Status.status` for every failed challenge.
pub const STATUS_FAILURE: &str = "Failure";

/// The provider or the Kubernetes API rejected our credentials.
pub const REASON_UNAUTHORIZED: &str = "Unauthorized";

/// The caller is authenticated but not allowed to touch the resource.
pub const REASON_FORBIDDEN: &str = "Forbidden";

/// A referenced secret, key or domain does not exist.
pub const REASON_NOT_FOUND: &str = "NotFound";

/// The request or the solver configuration is malformed.
pub const REASON_BAD_REQUEST: &str = "BadRequest";

/// Configuration decoded but its values are unusable (e.g. a non-RSA key).
pub const REASON_INVALID: &str = "Invalid";

/// The provider is unreachable, rate limiting, or failing with 5xx.
pub const REASON_SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";

/// The provider did not answer in time.
pub const REASON_TIMEOUT: &str = "Timeout";

/// Anything that does not fit a more specific reason.
pub const REASON_INTERNAL_ERROR: &str = "InternalError";

/// Map a reason to the HTTP-style code carried in `Status.code`.
#[must_use]
pub fn reason_code(reason: &str) -> u16 {
    match reason {
        REASON_BAD_REQUEST => 400,
        REASON_UNAUTHORIZED => 401,
        REASON_FORBIDDEN => 403,
        REASON_NOT_FOUND => 404,
        REASON_INVALID => 422,
        REASON_SERVICE_UNAVAILABLE => 503,
        REASON_TIMEOUT => 504,
        _ => 500,
    }
}

/// Map an HTTP status code returned by the TransIP API to a status reason.
///
/// | HTTP Code | Reason |
/// |-----------|--------|
/// | 400, 406, 409 | `BadRequest` |
/// | 401 | `Unauthorized` |
/// | 403 | `Forbidden` |
/// | 404 | `NotFound` |
/// | 408 | `Timeout` |
/// | 422 | `Invalid` |
/// | 429, 5xx | `ServiceUnavailable` |
/// | Other | `InternalError` |
#[must_use]
pub fn map_http_status_to_reason(status_code: u16) -> &'static str {
    match status_code {
        400 | 406 | 409 => REASON_BAD_REQUEST,
        401 => REASON_UNAUTHORIZED,
        403 => REASON_FORBIDDEN,
        404 => REASON_NOT_FOUND,
        408 => REASON_TIMEOUT,
        422 => REASON_INVALID,
        429 | 500..=599 => REASON_SERVICE_UNAVAILABLE,
        _ => REASON_INTERNAL_ERROR,
    }
}

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
