//! Decisions: ordered policy units evaluated after a response arrives.
//!
//! # Design
//! The client walks a [`Decisions`] list in order. A decision that does not
//! apply is skipped; the first one that applies returns exactly one
//! [`DecisionAction`], which either hands a (possibly rewritten) response to
//! the next decision, restarts the whole send with a new list, or ends the
//! send with an error or a value.
//!
//! Decisions are located by [`DecisionKind`], not by value. Retry uses this
//! to swap itself for a copy with a smaller budget when it restarts, so the
//! budget travels with the list instead of living in shared mutable state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::decode::JsonDecoder;
use crate::error::{ApiError, BoxError, UnexpectedStatus};
use crate::http::{HttpRequest, HttpResponse};

/// Stable identifier used to find and replace a decision in a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecisionKind(pub &'static str);

impl DecisionKind {
    pub const RETRY: DecisionKind = DecisionKind("retry");
    pub const BAD_STATUS: DecisionKind = DecisionKind("bad-status");
    pub const MAP_DATA: DecisionKind = DecisionKind("map-data");
    pub const PARSE_RESULT: DecisionKind = DecisionKind("parse-result");
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Outcome of applying one decision.
pub enum DecisionAction<T> {
    /// Pass the response on to the next decision.
    Continue { data: Vec<u8>, response: HttpResponse },
    /// Drop this attempt and send again from scratch with `decisions`.
    Restart(Decisions<T>),
    /// End the send with a failure.
    Error(ApiError),
    /// End the send with a decoded value.
    Done(T),
}

impl<T> fmt::Debug for DecisionAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Continue { data, response } => f
                .debug_struct("Continue")
                .field("status", &response.status)
                .field("bytes", &data.len())
                .finish(),
            DecisionAction::Restart(decisions) => {
                f.debug_tuple("Restart").field(decisions).finish()
            }
            DecisionAction::Error(err) => f.debug_tuple("Error").field(err).finish(),
            DecisionAction::Done(_) => f.write_str("Done(..)"),
        }
    }
}

/// What a decision can see about the current attempt.
pub struct DecisionContext<'a, T> {
    /// The request as it went out, after all adapters ran.
    pub request: &'a HttpRequest,
    /// The full decision list this attempt started with.
    pub decisions: &'a Decisions<T>,
    pub decoder: &'a JsonDecoder,
}

/// A policy unit in the decision chain.
#[async_trait]
pub trait Decision<T>: Send + Sync {
    fn kind(&self) -> DecisionKind;

    /// True for a decision that always applies and always terminates. A list
    /// must end in one.
    fn is_catch_all(&self) -> bool {
        false
    }

    fn should_apply(
        &self,
        ctx: &DecisionContext<'_, T>,
        data: &[u8],
        response: &HttpResponse,
    ) -> bool;

    async fn apply(
        &self,
        ctx: &DecisionContext<'_, T>,
        data: Vec<u8>,
        response: HttpResponse,
    ) -> DecisionAction<T>;
}

/// Ordered decision list. Cloning is cheap; entries are shared.
pub struct Decisions<T>(Vec<Arc<dyn Decision<T>>>);

impl<T> Decisions<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `decision` to the end of the list.
    pub fn then(mut self, decision: impl Decision<T> + 'static) -> Self {
        self.0.push(Arc::new(decision));
        self
    }

    pub fn push(&mut self, decision: Arc<dyn Decision<T>>) {
        self.0.push(decision);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Decision<T>>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> Vec<DecisionKind> {
        self.0.iter().map(|d| d.kind()).collect()
    }

    pub fn position(&self, kind: DecisionKind) -> Option<usize> {
        self.0.iter().position(|d| d.kind() == kind)
    }

    pub fn get(&self, kind: DecisionKind) -> Option<&Arc<dyn Decision<T>>> {
        self.0.iter().find(|d| d.kind() == kind)
    }

    /// A copy of the list with the first decision of `kind` swapped for
    /// `decision`. Returns an unchanged copy when no such decision exists.
    pub fn replacing(&self, kind: DecisionKind, decision: Arc<dyn Decision<T>>) -> Self {
        let mut list = self.0.clone();
        if let Some(index) = self.position(kind) {
            list[index] = decision;
        }
        Self(list)
    }

    /// A copy of the list without decisions of `kind`.
    pub fn removing(&self, kind: DecisionKind) -> Self {
        Self(self.0.iter().filter(|d| d.kind() != kind).cloned().collect())
    }

    pub fn ends_in_catch_all(&self) -> bool {
        self.0.last().is_some_and(|d| d.is_catch_all())
    }
}

impl<T> Decisions<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Retry on non-2xx while budget remains, then decode the body whatever
    /// the status.
    pub fn standard(retry_count: u32) -> Self {
        Self::new()
            .then(RetryDecision::new(retry_count))
            .then(ParseResultDecision)
    }

    /// Like [`standard`](Self::standard), but a non-2xx left after the retries
    /// fails with [`UnexpectedStatus`] instead of being decoded.
    pub fn strict(retry_count: u32) -> Self {
        Self::new()
            .then(RetryDecision::new(retry_count))
            .then(BadStatusDecision)
            .then(ParseResultDecision)
    }
}

impl<T> Default for Decisions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Decisions<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Decisions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|d| d.kind().0)).finish()
    }
}

impl<T> FromIterator<Arc<dyn Decision<T>>> for Decisions<T> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Decision<T>>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Restarts the send on a non-2xx status while `remaining > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub remaining: u32,
}

impl RetryDecision {
    pub fn new(remaining: u32) -> Self {
        Self { remaining }
    }
}

#[async_trait]
impl<T: Send + 'static> Decision<T> for RetryDecision {
    fn kind(&self) -> DecisionKind {
        DecisionKind::RETRY
    }

    fn should_apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        _data: &[u8],
        response: &HttpResponse,
    ) -> bool {
        !response.is_success() && self.remaining > 0
    }

    async fn apply(
        &self,
        ctx: &DecisionContext<'_, T>,
        _data: Vec<u8>,
        response: HttpResponse,
    ) -> DecisionAction<T> {
        let next = RetryDecision::new(self.remaining.saturating_sub(1));
        log::debug!(
            "HTTP {} from {}, retrying ({} left after this)",
            response.status,
            ctx.request.url,
            next.remaining
        );
        DecisionAction::Restart(ctx.decisions.replacing(DecisionKind::RETRY, Arc::new(next)))
    }
}

/// Fails the send on a non-2xx status.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadStatusDecision;

#[async_trait]
impl<T: Send + 'static> Decision<T> for BadStatusDecision {
    fn kind(&self) -> DecisionKind {
        DecisionKind::BAD_STATUS
    }

    fn should_apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        _data: &[u8],
        response: &HttpResponse,
    ) -> bool {
        !response.is_success()
    }

    async fn apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        _data: Vec<u8>,
        response: HttpResponse,
    ) -> DecisionAction<T> {
        let status = response.status;
        DecisionAction::Error(ApiError::response(status, UnexpectedStatus(status)))
    }
}

/// Rewrites the body before later decisions see it, e.g. to unwrap an
/// envelope like `{"data": ...}`.
pub struct MapDataDecision<F> {
    map: F,
}

impl<F> MapDataDecision<F>
where
    F: Fn(Vec<u8>, &HttpResponse) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    pub fn new(map: F) -> Self {
        Self { map }
    }
}

#[async_trait]
impl<T, F> Decision<T> for MapDataDecision<F>
where
    T: Send + 'static,
    F: Fn(Vec<u8>, &HttpResponse) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn kind(&self) -> DecisionKind {
        DecisionKind::MAP_DATA
    }

    fn should_apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        _data: &[u8],
        _response: &HttpResponse,
    ) -> bool {
        true
    }

    async fn apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        data: Vec<u8>,
        response: HttpResponse,
    ) -> DecisionAction<T> {
        match (self.map)(data, &response) {
            Ok(data) => DecisionAction::Continue { data, response },
            Err(err) => DecisionAction::Error(ApiError::response(response.status, err)),
        }
    }
}

/// Decodes the body into the response type. Always applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseResultDecision;

#[async_trait]
impl<T> Decision<T> for ParseResultDecision
where
    T: DeserializeOwned + Send + 'static,
{
    fn kind(&self) -> DecisionKind {
        DecisionKind::PARSE_RESULT
    }

    fn is_catch_all(&self) -> bool {
        true
    }

    fn should_apply(
        &self,
        _ctx: &DecisionContext<'_, T>,
        _data: &[u8],
        _response: &HttpResponse,
    ) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &DecisionContext<'_, T>,
        data: Vec<u8>,
        response: HttpResponse,
    ) -> DecisionAction<T> {
        match ctx.decoder.decode::<T>(&data) {
            Ok(value) => DecisionAction::Done(value),
            Err(err) => DecisionAction::Error(ApiError::response(response.status, err)),
        }
    }
}
