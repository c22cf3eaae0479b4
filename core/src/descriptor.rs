//! Request descriptors: declarative values describing one endpoint.
//!
//! # Design
//! [`ApiRequest`] names what a request needs (URL, method, parameters, body
//! encoding) as required methods and supplies everything else (headers,
//! timeout, retry budget, adapter and decision chains) as default methods, so
//! a typical endpoint implements five methods. [`Endpoint`] is the same
//! contract as a plain value with builder setters.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::adapter::{
    ContentAdapter, HeaderAdapter, MethodAdapter, PriorityAdapter, RequestAdapter, TimeoutAdapter,
};
use crate::decision::Decisions;
use crate::error::{AdapterError, ApiError};
use crate::http::{ContentType, HttpMethod, Priority, DEFAULT_TIMEOUT};
use crate::logging::{DebugLogDecision, LogDecision};
use crate::parameters::{ParameterAdapter, Parameters};

/// Retry budget used when a descriptor does not override it.
pub const DEFAULT_RETRY_COUNT: u32 = 1;

/// Describes one HTTP request and the policy for handling its response.
pub trait ApiRequest: Send + Sync {
    /// Type the response body decodes into.
    type Response: DeserializeOwned + Send + 'static;

    fn base_url(&self) -> &str;
    fn path(&self) -> &str;
    fn method(&self) -> HttpMethod;
    fn parameters(&self) -> Result<Parameters, AdapterError>;
    fn content_type(&self) -> ContentType;

    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn priority(&self) -> Priority {
        Priority::Default
    }

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// How many times a non-2xx response is retried before giving up.
    fn retry_count(&self) -> u32 {
        DEFAULT_RETRY_COUNT
    }

    /// Target URL: `base_url` with the segments of `path` appended.
    fn url(&self) -> Result<Url, ApiError> {
        resolve_url(self.base_url(), self.path())
    }

    fn parameter_adapters(&self) -> Vec<Arc<dyn ParameterAdapter>> {
        Vec::new()
    }

    /// Request adapters, given the parameters after parameter adapters ran.
    fn adapters(&self, parameters: &Parameters) -> Vec<Arc<dyn RequestAdapter>> {
        default_adapters(self, parameters)
    }

    fn decisions(&self) -> Decisions<Self::Response> {
        Decisions::standard(self.retry_count())
    }

    fn log_decisions(&self) -> Vec<Arc<dyn LogDecision>> {
        vec![Arc::new(DebugLogDecision)]
    }
}

/// Method, extra headers, content, timeout, priority, in that order.
pub fn default_adapters<R>(request: &R, parameters: &Parameters) -> Vec<Arc<dyn RequestAdapter>>
where
    R: ApiRequest + ?Sized,
{
    vec![
        Arc::new(MethodAdapter(request.method())),
        Arc::new(HeaderAdapter(request.extra_headers())),
        Arc::new(ContentAdapter {
            method: request.method(),
            content_type: request.content_type(),
            parameters: parameters.clone(),
        }),
        Arc::new(TimeoutAdapter(request.timeout())),
        Arc::new(PriorityAdapter(request.priority())),
    ]
}

/// Join `path` onto `base_url`, keeping any query the base URL carries.
pub fn resolve_url(base_url: &str, path: &str) -> Result<Url, ApiError> {
    let mut url =
        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Ok(url);
    }
    url.path_segments_mut()
        .map_err(|()| ApiError::InvalidUrl(format!("{base_url}: cannot be a base URL")))?
        .pop_if_empty()
        .extend(path.split('/'));
    Ok(url)
}

/// An [`ApiRequest`] built from values instead of a trait impl.
pub struct Endpoint<T> {
    base_url: String,
    path: String,
    method: HttpMethod,
    parameters: Parameters,
    content_type: ContentType,
    extra_headers: Vec<(String, String)>,
    priority: Priority,
    timeout: Duration,
    retry_count: u32,
    parameter_adapters: Vec<Arc<dyn ParameterAdapter>>,
    adapters: Option<Vec<Arc<dyn RequestAdapter>>>,
    decisions: Option<Decisions<T>>,
    log_decisions: Option<Vec<Arc<dyn LogDecision>>>,
    _response: PhantomData<fn() -> T>,
}

impl<T> Endpoint<T> {
    pub fn new(method: HttpMethod, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method,
            parameters: Parameters::new(),
            content_type: ContentType::Json,
            extra_headers: Vec::new(),
            priority: Priority::Default,
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            parameter_adapters: Vec::new(),
            adapters: None,
            decisions: None,
            log_decisions: None,
            _response: PhantomData,
        }
    }

    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, base_url, path)
    }

    pub fn post(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, base_url, path)
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn parameter_adapter(mut self, adapter: impl ParameterAdapter + 'static) -> Self {
        self.parameter_adapters.push(Arc::new(adapter));
        self
    }

    /// Replace the whole request adapter chain. The chain is then
    /// responsible for attaching parameters.
    pub fn adapters(mut self, adapters: Vec<Arc<dyn RequestAdapter>>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn decisions(mut self, decisions: Decisions<T>) -> Self {
        self.decisions = Some(decisions);
        self
    }

    pub fn log_decisions(mut self, log_decisions: Vec<Arc<dyn LogDecision>>) -> Self {
        self.log_decisions = Some(log_decisions);
        self
    }
}

impl<T> ApiRequest for Endpoint<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Response = T;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn parameters(&self) -> Result<Parameters, AdapterError> {
        Ok(self.parameters.clone())
    }

    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        self.extra_headers.clone()
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn parameter_adapters(&self) -> Vec<Arc<dyn ParameterAdapter>> {
        self.parameter_adapters.clone()
    }

    fn adapters(&self, parameters: &Parameters) -> Vec<Arc<dyn RequestAdapter>> {
        match &self.adapters {
            Some(adapters) => adapters.clone(),
            None => default_adapters(self, parameters),
        }
    }

    fn decisions(&self) -> Decisions<T> {
        match &self.decisions {
            Some(decisions) => decisions.clone(),
            None => Decisions::standard(self.retry_count),
        }
    }

    fn log_decisions(&self) -> Vec<Arc<dyn LogDecision>> {
        match &self.log_decisions {
            Some(log_decisions) => log_decisions.clone(),
            None => vec![Arc::new(DebugLogDecision)],
        }
    }
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            content_type: self.content_type,
            extra_headers: self.extra_headers.clone(),
            priority: self.priority,
            timeout: self.timeout,
            retry_count: self.retry_count,
            parameter_adapters: self.parameter_adapters.clone(),
            adapters: self.adapters.clone(),
            decisions: self.decisions.clone(),
            log_decisions: self.log_decisions.clone(),
            _response: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .field("content_type", &self.content_type)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}
