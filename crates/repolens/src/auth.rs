//! Credential resolution for outbound provider requests.
//!
//! Precedence: caller-supplied user token > process-wide app fallback token >
//! anonymous. The provider-required metadata headers are attached on every
//! request regardless of auth presence. Token values never appear in logs.

use crate::http::HttpHeaders;

/// GitHub REST API version pin, sent on every request.
pub const API_VERSION: &str = "2022-11-28";

/// Client identifier required by the provider.
pub const USER_AGENT: &str = "repolens";

/// Pick the credential to use for a request, if any.
#[inline]
#[must_use]
pub fn resolve_token<'a>(
    user_token: Option<&'a str>,
    app_token: Option<&'a str>,
) -> Option<&'a str> {
    user_token
        .filter(|t| !t.is_empty())
        .or_else(|| app_token.filter(|t| !t.is_empty()))
}

/// Build the header set for an outbound provider request.
///
/// Always includes `Accept`, the API version pin, and `User-Agent`; adds a
/// bearer `Authorization` header only when a token resolves.
#[must_use]
pub fn resolve_headers(user_token: Option<&str>, app_token: Option<&str>) -> HttpHeaders {
    let mut headers: HttpHeaders = vec![
        (
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        ),
        ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ("User-Agent".to_string(), USER_AGENT.to_string()),
    ];

    if let Some(token) = resolve_token(user_token, app_token) {
        headers.push(("Authorization".to_string(), format!("Bearer {token}")));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn user_token_takes_precedence_over_app_token() {
        let headers = resolve_headers(Some("user-tok"), Some("app-tok"));
        assert_eq!(header(&headers, "authorization"), Some("Bearer user-tok"));
    }

    #[test]
    fn app_token_is_the_fallback() {
        let headers = resolve_headers(None, Some("app-tok"));
        assert_eq!(header(&headers, "authorization"), Some("Bearer app-tok"));
    }

    #[test]
    fn empty_user_token_falls_through_to_app_token() {
        assert_eq!(resolve_token(Some(""), Some("app-tok")), Some("app-tok"));
    }

    #[test]
    fn anonymous_requests_omit_authorization() {
        let headers = resolve_headers(None, None);
        assert_eq!(header(&headers, "authorization"), None);
    }

    #[test]
    fn metadata_headers_are_always_present() {
        for headers in [
            resolve_headers(None, None),
            resolve_headers(Some("t"), None),
        ] {
            assert_eq!(
                header(&headers, "accept"),
                Some("application/vnd.github+json")
            );
            assert_eq!(header(&headers, "x-github-api-version"), Some(API_VERSION));
            assert_eq!(header(&headers, "user-agent"), Some(USER_AGENT));
        }
    }
}
