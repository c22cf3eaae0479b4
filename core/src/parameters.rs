//! Parameter bag and the adapters that rewrite it before a request is built.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AdapterError;
use crate::transport::{Clock, SystemClock};

/// String-keyed parameter map attached to a request as query items or body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert any serializable value into a parameter bag.
    ///
    /// The value must serialize to a JSON object; `()` and `None` give an
    /// empty bag.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, AdapterError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(AdapterError::InvalidParameters {
                found: kind_of(&other),
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Pairs rendered as text, in map order, for query strings and form bodies.
    pub fn text_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), query_value(value)))
            .collect()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Render a parameter value the way it appears in a query string.
///
/// Strings are emitted bare, `null` as an empty string, and nested arrays or
/// objects as compact JSON.
pub fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rewrites the parameter bag before request adapters run.
pub trait ParameterAdapter: Send + Sync {
    fn adapt(&self, parameters: Parameters) -> Result<Parameters, AdapterError>;
}

impl<F> ParameterAdapter for F
where
    F: Fn(Parameters) -> Result<Parameters, AdapterError> + Send + Sync,
{
    fn adapt(&self, parameters: Parameters) -> Result<Parameters, AdapterError> {
        self(parameters)
    }
}

/// Apply `adapters` to `initial` in order, stopping at the first failure.
pub fn apply_parameter_adapters(
    initial: Parameters,
    adapters: &[Arc<dyn ParameterAdapter>],
) -> Result<Parameters, AdapterError> {
    adapters
        .iter()
        .try_fold(initial, |acc, adapter| adapter.adapt(acc))
}

/// Adds fixed entries, overriding keys that are already present.
#[derive(Debug, Clone, Default)]
pub struct MergeParameters(pub Parameters);

impl ParameterAdapter for MergeParameters {
    fn adapt(&self, mut parameters: Parameters) -> Result<Parameters, AdapterError> {
        for (key, value) in self.0.iter() {
            parameters.insert(key.clone(), value.clone());
        }
        Ok(parameters)
    }
}

/// Inserts the current Unix timestamp (seconds) under `key`.
#[derive(Clone)]
pub struct TimestampParameter {
    pub key: String,
    clock: Arc<dyn Clock>,
}

impl TimestampParameter {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl fmt::Debug for TimestampParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampParameter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ParameterAdapter for TimestampParameter {
    fn adapt(&self, mut parameters: Parameters) -> Result<Parameters, AdapterError> {
        parameters.insert(self.key.clone(), self.clock.now().timestamp());
        Ok(parameters)
    }
}
