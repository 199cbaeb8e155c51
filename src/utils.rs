use axum::http::HeaderMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier used for clients that do not come through the proxy.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extracts the rate-limit identifier of the client from request headers.
///
/// Uses the first entry of `X-Forwarded-For`, i.e. the address the proxy saw.
/// Returns [`UNKNOWN_CLIENT`] when the header is absent or unusable.
pub fn client_identifier(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::*;

    #[rstest]
    #[case(Some("203.0.113.7"), "203.0.113.7")]
    #[case(Some("203.0.113.7, 10.0.0.1"), "203.0.113.7")]
    #[case(Some(" , 198.51.100.4"), "198.51.100.4")]
    #[case(Some("2001:db8::1"), "2001:db8::1")]
    #[case(Some(""), "unknown")]
    #[case(None, "unknown")]
    fn test_client_identifier(#[case] forwarded_for: Option<&str>, #[case] expected: &str) {
        let mut headers = HeaderMap::new();
        if let Some(value) = forwarded_for {
            headers.insert(
                "x-forwarded-for",
                HeaderValue::from_str(value).expect("valid header value"),
            );
        }
        assert_eq!(client_identifier(&headers), expected);
    }

    #[test]
    fn test_unix_millis_is_after_2020() {
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
