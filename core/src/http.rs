//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. Adapters
//! build an `HttpRequest` step by step, a [`Transport`](crate::transport::Transport)
//! executes it and hands back a `RawResponse`, and the client validates that
//! into an `HttpResponse` head plus body bytes before the decision chain runs.
//!
//! All fields use owned types so values can be cloned into log snapshots and
//! moved across tasks without lifetime concerns.

use std::time::Duration;

use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method for a request.
///
/// Only GET and POST are supported; other verbs are not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Encoding used for the body of non-GET requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Json,
    UrlForm,
}

impl ContentType {
    /// Value sent in the `Content-Type` header.
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::UrlForm => "application/x-www-form-urlencoded; charset=utf-8",
        }
    }
}

/// Scheduling hint passed down to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Default,
    High,
}

impl Priority {
    pub fn value(self) -> f32 {
        match self {
            Priority::Low => 0.0,
            Priority::Default => 0.5,
            Priority::High => 1.0,
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub priority: Priority,
}

impl HttpRequest {
    /// A bare GET request to `url` with default timeout and priority.
    pub fn new(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            priority: Priority::Default,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Replace the header named `name` (case-insensitively) or append it.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }
}

/// What a transport hands back, before validation.
///
/// `status` is `None` when the peer answered with something that is not an
/// HTTP response; `body` is `None` when no payload was delivered at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(status),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }
}

/// Validated response head seen by decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::new(Url::parse("https://api.test/items").unwrap())
    }

    #[test]
    fn new_request_has_defaults() {
        let req = request();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.timeout, Duration::from_secs(30));
        assert_eq!(req.priority, Priority::Default);
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = request();
        req.set_header("Content-Type", "text/plain");
        req.set_header("X-Trace", "1");
        req.set_header("content-type", "application/json");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.headers[0].0, "Content-Type");
    }

    #[test]
    fn success_range_is_half_open() {
        let head = |status| HttpResponse {
            status,
            headers: Vec::new(),
        };
        assert!(head(200).is_success());
        assert!(head(299).is_success());
        assert!(!head(300).is_success());
        assert!(!head(199).is_success());
    }

    #[test]
    fn priority_values() {
        assert_eq!(Priority::Low.value(), 0.0);
        assert_eq!(Priority::default().value(), 0.5);
        assert_eq!(Priority::High.value(), 1.0);
    }
}
