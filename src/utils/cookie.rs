// src/utils/cookie.rs

use axum::http::HeaderMap;
use axum::http::header;

/// Value of the named cookie from the request's `Cookie` headers.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for an HTTP-only, secure, same-site-strict cookie.
pub fn secure(name: &str, value: &str, max_age_seconds: i64) -> String {
    format!("{name}={value}; Path=/; Max-Age={max_age_seconds}; HttpOnly; Secure; SameSite=Strict")
}

/// `Set-Cookie` value that removes the cookie.
pub fn clear(name: &str) -> String {
    secure(name, "", 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; session=eyJ4Ijo=; b=2"));
        assert_eq!(get(&headers, "session").as_deref(), Some("eyJ4Ijo="));
        assert_eq!(get(&headers, "missing"), None);
    }

    #[test]
    fn secure_cookie_has_all_flags() {
        let value = secure("session", "abc", 86400);
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
        assert!(value.contains("SameSite=Strict"));
        assert!(value.contains("Max-Age=86400"));
    }
}
