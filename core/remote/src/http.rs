//! Shared HTTP plumbing for remote backends: the fixed status-code to
//! `SyncErrorType` mapping and `Link` header pagination, grounded on the
//! same status dispatch and page-following loop the originating GitHub
//! adapter used, just generalized past one backend.

use reqwest::StatusCode;
use roadmap_common::{SyncError, SyncErrorType};

/// Maps an HTTP response's status code to a classified `SyncError`.
/// `body` is the raw response text (used for 422's field-level detail);
/// `retry_after` is the `Retry-After` header value, if present.
pub fn classify_status(status: StatusCode, operation: &str, body: &str, retry_after: Option<&str>) -> SyncError {
    let code = status.as_u16();
    match code {
        400 => {
            tracing::warn!(status = code, operation, "remote api bad request");
            SyncError::new(SyncErrorType::InvalidData, "Bad request: invalid request payload")
                .with_suggestion("Check the request payload against the backend's schema")
        }
        401 => {
            tracing::warn!(status = code, operation, "remote api authentication failed");
            SyncError::new(SyncErrorType::AuthenticationFailed, "Authentication failed. Check your access token.")
                .with_suggestion("Check that the configured token is present and valid")
        }
        403 => {
            tracing::debug!(status = code, operation, "remote api access forbidden");
            SyncError::new(SyncErrorType::PermissionDenied, "Access forbidden. Check repository permissions and token scopes.")
                .with_suggestion("Check repository permissions and token scopes")
        }
        404 => {
            tracing::warn!(status = code, operation, "remote api resource not found");
            SyncError::new(SyncErrorType::ResourceNotFound, "Resource not found")
        }
        410 => {
            tracing::info!(status = code, operation, "remote api resource gone");
            SyncError::new(SyncErrorType::ResourceDeleted, "Resource has been deleted (410 Gone)")
        }
        422 => {
            let detail = extract_validation_detail(body);
            tracing::warn!(status = code, operation, validation_errors = %detail, "remote api validation error");
            SyncError::new(SyncErrorType::InvalidData, format!("Validation error: {detail}"))
        }
        429 => {
            let retry_after_secs = retry_after.and_then(|v| v.parse::<u64>().ok());
            tracing::warn!(status = code, operation, retry_after = ?retry_after, "remote api rate limited");
            SyncError::rate_limit_error(retry_after_secs)
        }
        500..=599 => {
            tracing::warn!(status = code, operation, "remote api server error");
            SyncError::new(SyncErrorType::ServiceUnavailable, format!("Remote API server error ({code})"))
                .with_suggestion("Wait and retry; the remote service is having trouble")
        }
        _ => {
            tracing::warn!(status = code, operation, "remote api unknown error");
            SyncError::new(SyncErrorType::UnknownError, format!("Remote API error ({code})"))
        }
    }
}

fn extract_validation_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return "validation failed".to_string();
    };
    let message = value.get("message").and_then(|v| v.as_str()).unwrap_or("Validation failed");
    let Some(errors) = value.get("errors").and_then(|v| v.as_array()) else {
        return message.to_string();
    };
    let details: Vec<String> = errors
        .iter()
        .map(|e| {
            let field = e.get("field").and_then(|v| v.as_str()).unwrap_or("unknown");
            let code = e.get("code").and_then(|v| v.as_str()).unwrap_or("unknown");
            let msg = e.get("message").and_then(|v| v.as_str()).unwrap_or("");
            format!("{field}:{code} {msg}").trim().to_string()
        })
        .collect();
    if details.is_empty() {
        message.to_string()
    } else {
        format!("{message} - {}", details.join("; "))
    }
}

/// Converts a transport-level `reqwest::Error` (one that never reached
/// a response) to a `network_error`.
pub fn network_error(operation: &str, err: &reqwest::Error) -> SyncError {
    tracing::warn!(operation, error = %err, "remote api request failed");
    SyncError::network_error(format!("Request failed: {err}"))
}

/// Extracts the `rel="next"` URL from a raw `Link` header value, per
/// RFC 8288. Returns `None` when there is no next page.
pub fn parse_next_link(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        let mut segments = part.split(';').map(str::trim);
        let url_segment = segments.next()?;
        let is_next = segments.any(|s| s == r#"rel="next""#);
        if is_next {
            let url = url_segment.trim_start_matches('<').trim_end_matches('>');
            return Some(url.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_maps_known_codes() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, "GET /x", "", None).category, SyncErrorType::AuthenticationFailed);
        assert_eq!(classify_status(StatusCode::FORBIDDEN, "GET /x", "", None).category, SyncErrorType::PermissionDenied);
        assert_eq!(classify_status(StatusCode::NOT_FOUND, "GET /x", "", None).category, SyncErrorType::ResourceNotFound);
        assert_eq!(classify_status(StatusCode::GONE, "GET /x", "", None).category, SyncErrorType::ResourceDeleted);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST, "GET /x", "", None).category, SyncErrorType::InvalidData);
        assert_eq!(classify_status(StatusCode::from_u16(422).unwrap(), "GET /x", "{}", None).category, SyncErrorType::InvalidData);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS, "GET /x", "", Some("30")).category, SyncErrorType::ApiRateLimit);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY, "GET /x", "", None).category, SyncErrorType::ServiceUnavailable);
        assert_eq!(classify_status(StatusCode::IM_A_TEAPOT, "GET /x", "", None).category, SyncErrorType::UnknownError);
    }

    #[test]
    fn rate_limit_captures_retry_after() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "GET /x", "", Some("42"));
        assert_eq!(err.metadata.get("retry_after").and_then(|v| v.as_u64()), Some(42));
    }

    #[test]
    fn validation_error_surfaces_field_details() {
        let body = r#"{"message":"Validation failed","errors":[{"field":"title","code":"missing_field","message":""}]}"#;
        let err = classify_status(StatusCode::from_u16(422).unwrap(), "POST /x", body, None);
        assert!(err.message.contains("title:missing_field"));
    }

    #[test]
    fn parse_next_link_finds_rel_next() {
        let header = r#"<https://api.example.com/issues?page=2>; rel="next", <https://api.example.com/issues?page=5>; rel="last""#;
        assert_eq!(parse_next_link(header), Some("https://api.example.com/issues?page=2".to_string()));
    }

    #[test]
    fn parse_next_link_returns_none_without_next() {
        let header = r#"<https://api.example.com/issues?page=1>; rel="last""#;
        assert_eq!(parse_next_link(header), None);
    }
}
