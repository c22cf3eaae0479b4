//! Declarative HTTP request pipeline.
//!
//! # Overview
//! A request is described by an [`ApiRequest`] descriptor: where it goes,
//! which parameters it carries, how they are encoded, and how the response is
//! handled. [`Client::send`] runs the descriptor through a fixed pipeline:
//!
//! ```text
//! descriptor -> parameter adapters -> request adapters -> transport
//!            -> log decisions -> decision chain -> typed result
//! ```
//!
//! The core never performs I/O itself (host-does-IO pattern). The host
//! supplies a [`Transport`] that executes built requests, which keeps the
//! pipeline deterministic and testable against scripted transports.
//!
//! # Design
//! - Adapters are pure, order-dependent transforms applied as left folds.
//! - Decisions return a [`DecisionAction`] sum type instead of invoking
//!   callbacks, so every evaluation yields exactly one action.
//! - Retry is a decision that restarts the send with a copy of the decision
//!   list holding a smaller budget; no retry state is shared between sends.
//! - `Client` is stateless and cheap to clone; the JSON decoder it lends to
//!   decisions is scoped to the client instance.

pub mod adapter;
pub mod cancel;
pub mod client;
pub mod decision;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod logging;
pub mod parameters;
pub mod transport;

pub use adapter::{
    apply_request_adapters, ContentAdapter, ContentTypeHeaderAdapter, FormBodyAdapter,
    HeaderAdapter, JsonBodyAdapter, MethodAdapter, PriorityAdapter, QueryAdapter, RequestAdapter,
    TimeoutAdapter,
};
pub use cancel::CancelHandle;
pub use client::{Client, ClientBuilder, CompletionContext, SendHandle};
pub use decision::{
    BadStatusDecision, Decision, DecisionAction, DecisionContext, DecisionKind, Decisions,
    MapDataDecision, ParseResultDecision, RetryDecision,
};
pub use decode::JsonDecoder;
pub use descriptor::{default_adapters, resolve_url, ApiRequest, Endpoint, DEFAULT_RETRY_COUNT};
pub use error::{AdapterError, ApiError, BoxError, TransportError, UnexpectedStatus};
pub use http::{
    ContentType, HttpMethod, HttpRequest, HttpResponse, Priority, RawResponse, DEFAULT_TIMEOUT,
};
pub use logging::{DebugLogDecision, LogDecision, LogInfo};
pub use parameters::{
    apply_parameter_adapters, MergeParameters, ParameterAdapter, Parameters, TimestampParameter,
};
pub use transport::{Clock, SystemClock, Transport};
