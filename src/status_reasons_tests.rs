// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for status reason mapping.

#[cfg(test)]
mod tests {
    use crate::status_reasons::*;

    #[test]
    fn test_auth_failures_map_to_unauthorized_and_forbidden() {
        assert_eq!(map_http_status_to_reason(401), REASON_UNAUTHORIZED);
        assert_eq!(map_http_status_to_reason(403), REASON_FORBIDDEN);
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(map_http_status_to_reason(400), REASON_BAD_REQUEST);
        assert_eq!(map_http_status_to_reason(404), REASON_NOT_FOUND);
        assert_eq!(map_http_status_to_reason(406), REASON_BAD_REQUEST);
        assert_eq!(map_http_status_to_reason(409), REASON_BAD_REQUEST);
        assert_eq!(map_http_status_to_reason(422), REASON_INVALID);
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_unavailable() {
        for code in [429, 500, 502, 503, 504, 599] {
            assert_eq!(
                map_http_status_to_reason(code),
                REASON_SERVICE_UNAVAILABLE,
                "HTTP {code} should map to ServiceUnavailable"
            );
        }
    }

    #[test]
    fn test_unexpected_codes_are_internal() {
        assert_eq!(map_http_status_to_reason(418), REASON_INTERNAL_ERROR);
        assert_eq!(map_http_status_to_reason(302), REASON_INTERNAL_ERROR);
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(reason_code(REASON_BAD_REQUEST), 400);
        assert_eq!(reason_code(REASON_UNAUTHORIZED), 401);
        assert_eq!(reason_code(REASON_NOT_FOUND), 404);
        assert_eq!(reason_code(REASON_SERVICE_UNAVAILABLE), 503);
        assert_eq!(reason_code(REASON_INTERNAL_ERROR), 500);
        assert_eq!(reason_code("SomethingElse"), 500);
    }
}
