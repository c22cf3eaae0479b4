//! Request adapters: ordered transforms over an outgoing `HttpRequest`.
//!
//! # Design
//! Each adapter receives the request produced by the previous one and returns
//! a new request. The chain is a strict left fold, so `[A, B, C]` yields
//! `C(B(A(initial)))`; the first failure aborts the whole chain and nothing
//! reaches the network.

use std::sync::Arc;
use std::time::Duration;

use ::http::header::{HeaderName, HeaderValue};
use url::form_urlencoded;

use crate::error::AdapterError;
use crate::http::{ContentType, HttpMethod, HttpRequest, Priority};
use crate::parameters::Parameters;

/// Transforms an outgoing request.
pub trait RequestAdapter: Send + Sync {
    fn adapt(&self, request: HttpRequest) -> Result<HttpRequest, AdapterError>;
}

impl<F> RequestAdapter for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, AdapterError> + Send + Sync,
{
    fn adapt(&self, request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        self(request)
    }
}

/// Apply `adapters` to `initial` in list order.
pub fn apply_request_adapters(
    initial: HttpRequest,
    adapters: &[Arc<dyn RequestAdapter>],
) -> Result<HttpRequest, AdapterError> {
    adapters
        .iter()
        .try_fold(initial, |acc, adapter| adapter.adapt(acc))
}

/// Sets the HTTP verb.
#[derive(Debug, Clone, Copy)]
pub struct MethodAdapter(pub HttpMethod);

impl RequestAdapter for MethodAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        request.method = self.0;
        Ok(request)
    }
}

/// Merges caller-supplied headers, replacing same-named ones.
#[derive(Debug, Clone, Default)]
pub struct HeaderAdapter(pub Vec<(String, String)>);

impl RequestAdapter for HeaderAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        for (name, value) in &self.0 {
            validate_header(name, value)?;
            request.set_header(name.clone(), value.clone());
        }
        Ok(request)
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), AdapterError> {
    let invalid = |reason: String| AdapterError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

/// Sets the per-request timeout.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutAdapter(pub Duration);

impl RequestAdapter for TimeoutAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        request.timeout = self.0;
        Ok(request)
    }
}

/// Sets the transport scheduling hint.
#[derive(Debug, Clone, Copy)]
pub struct PriorityAdapter(pub Priority);

impl RequestAdapter for PriorityAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        request.priority = self.0;
        Ok(request)
    }
}

/// Appends parameters as query items after any that the URL already has.
///
/// Keys are not de-duplicated.
#[derive(Debug, Clone)]
pub struct QueryAdapter(pub Parameters);

impl RequestAdapter for QueryAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        if self.0.is_empty() {
            return Ok(request);
        }
        {
            let mut query = request.url.query_pairs_mut();
            for (key, value) in self.0.text_pairs() {
                query.append_pair(&key, &value);
            }
        }
        Ok(request)
    }
}

/// Sets the `Content-Type` header for a body encoding.
#[derive(Debug, Clone, Copy)]
pub struct ContentTypeHeaderAdapter(pub ContentType);

impl RequestAdapter for ContentTypeHeaderAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        request.set_header("Content-Type", self.0.mime());
        Ok(request)
    }
}

/// Encodes the parameters as a JSON object body.
#[derive(Debug, Clone)]
pub struct JsonBodyAdapter(pub Parameters);

impl RequestAdapter for JsonBodyAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        request.body = Some(serde_json::to_vec(self.0.as_map())?);
        Ok(request)
    }
}

/// Encodes the parameters as an `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone)]
pub struct FormBodyAdapter(pub Parameters);

impl RequestAdapter for FormBodyAdapter {
    fn adapt(&self, mut request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        let mut form = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.0.text_pairs() {
            form.append_pair(&key, &value);
        }
        request.body = Some(form.finish().into_bytes());
        Ok(request)
    }
}

/// Attaches the parameters according to the method: query items for GET,
/// a typed body for POST.
#[derive(Debug, Clone)]
pub struct ContentAdapter {
    pub method: HttpMethod,
    pub content_type: ContentType,
    pub parameters: Parameters,
}

impl RequestAdapter for ContentAdapter {
    fn adapt(&self, request: HttpRequest) -> Result<HttpRequest, AdapterError> {
        match self.method {
            HttpMethod::Get => QueryAdapter(self.parameters.clone()).adapt(request),
            HttpMethod::Post => {
                let request = ContentTypeHeaderAdapter(self.content_type).adapt(request)?;
                match self.content_type {
                    ContentType::Json => JsonBodyAdapter(self.parameters.clone()).adapt(request),
                    ContentType::UrlForm => FormBodyAdapter(self.parameters.clone()).adapt(request),
                }
            }
        }
    }
}
