//! Stateless dispatcher that drives a descriptor through the pipeline.
//!
//! # Design
//! `Client` holds only shared, immutable collaborators (transport, clock,
//! decoder) and carries no state between sends, so one instance can serve
//! any number of concurrent sends. Each attempt runs the same steps:
//!
//! 1. apply parameter adapters, then request adapters (left folds);
//! 2. hand the built request to the transport;
//! 3. snapshot the attempt into a `LogInfo` and feed the log decisions;
//! 4. reject transport errors, missing bodies and non-HTTP responses;
//! 5. walk the decision chain until a decision ends or restarts the send.
//!
//! A restart begins again at step 1 with the decision list the restarting
//! decision returned. Callers see one outcome per send no matter how many
//! attempts ran.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapter::apply_request_adapters;
use crate::cancel::{guard, CancelHandle};
use crate::decision::{DecisionAction, DecisionContext, Decisions};
use crate::decode::JsonDecoder;
use crate::descriptor::ApiRequest;
use crate::error::{ApiError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::logging::{LogDecision, LogInfo};
use crate::parameters::apply_parameter_adapters;
use crate::transport::{Clock, SystemClock, Transport};

/// Where a callback-style send delivers its result.
#[derive(Debug, Clone, Default)]
pub enum CompletionContext {
    /// On the task that ran the send.
    #[default]
    Inline,
    /// As a new task on the given runtime.
    Runtime(Handle),
}

/// Handle to a send started with [`Client::send_with_callback`].
#[derive(Debug)]
pub struct SendHandle {
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

impl SendHandle {
    /// Abort the send. The completion will not be called afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the send task to finish. A panic inside the pipeline is
    /// re-raised here.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            if err.is_panic() {
                panic::resume_unwind(err.into_panic());
            }
        }
    }
}

enum Step<T> {
    Restart(Decisions<T>),
    Done(T),
}

/// A request that made it through the transport and response validation.
struct Attempt {
    request: HttpRequest,
    data: Vec<u8>,
    response: HttpResponse,
}

/// Dispatches [`ApiRequest`] descriptors through a [`Transport`].
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    decoder: JsonDecoder,
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder {
            transport: Arc::new(transport),
            clock: Arc::new(SystemClock),
            decoder: JsonDecoder::new(),
        }
    }

    pub fn decoder(&self) -> &JsonDecoder {
        &self.decoder
    }

    /// Send `request` and decode its response.
    ///
    /// `decisions` replaces the descriptor's own decision list when given.
    ///
    /// # Panics
    /// If the decision list does not end in a catch-all decision, or if no
    /// decision applies to a response. Both mean the list is malformed.
    pub async fn send<R>(
        &self,
        request: &R,
        decisions: Option<Decisions<R::Response>>,
    ) -> Result<R::Response>
    where
        R: ApiRequest + ?Sized,
    {
        self.run(request, decisions, None).await
    }

    /// Like [`send`](Self::send), returning [`ApiError::Cancelled`] once
    /// `cancel` fires.
    pub async fn send_with_cancel<R>(
        &self,
        request: &R,
        decisions: Option<Decisions<R::Response>>,
        cancel: &CancelHandle,
    ) -> Result<R::Response>
    where
        R: ApiRequest + ?Sized,
    {
        self.run(request, decisions, Some(cancel)).await
    }

    /// Run the send on a new task of the current tokio runtime and hand the
    /// result to `completion` on `context`.
    ///
    /// `completion` runs exactly once, unless the send is cancelled through
    /// the returned handle, in which case it never runs.
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn send_with_callback<R, F>(
        &self,
        request: R,
        decisions: Option<Decisions<R::Response>>,
        context: CompletionContext,
        completion: F,
    ) -> SendHandle
    where
        R: ApiRequest + 'static,
        F: FnOnce(Result<R::Response>) + Send + 'static,
    {
        let cancel = CancelHandle::new();
        let token = cancel.clone();
        let client = self.clone();
        let task = tokio::spawn(async move {
            let result = client.run(&request, decisions, Some(&token)).await;
            if token.is_cancelled() {
                log::debug!("send cancelled, dropping result");
                return;
            }
            match context {
                CompletionContext::Inline => completion(result),
                CompletionContext::Runtime(handle) => {
                    handle.spawn(async move {
                        if !token.is_cancelled() {
                            completion(result);
                        }
                    });
                }
            }
        });
        SendHandle { cancel, task }
    }

    /// Build the outgoing request for `request` without sending it.
    pub fn prepare<R>(&self, request: &R) -> Result<HttpRequest>
    where
        R: ApiRequest + ?Sized,
    {
        let url = request.url()?;
        let parameters =
            apply_parameter_adapters(request.parameters()?, &request.parameter_adapters())?;
        let adapters = request.adapters(&parameters);
        Ok(apply_request_adapters(HttpRequest::new(url), &adapters)?)
    }

    async fn run<R>(
        &self,
        request: &R,
        decisions: Option<Decisions<R::Response>>,
        cancel: Option<&CancelHandle>,
    ) -> Result<R::Response>
    where
        R: ApiRequest + ?Sized,
    {
        let mut decisions = decisions.unwrap_or_else(|| request.decisions());
        assert_catch_all(&decisions);

        let mut attempt_no = 1u32;
        loop {
            let attempt = self.attempt(request, cancel).await?;
            match self.decide(attempt, &decisions, cancel).await? {
                Step::Done(value) => return Ok(value),
                Step::Restart(next) => {
                    assert_catch_all(&next);
                    attempt_no += 1;
                    log::debug!("restarting send, attempt {attempt_no} with decisions {next:?}");
                    decisions = next;
                }
            }
        }
    }

    async fn attempt<R>(&self, request: &R, cancel: Option<&CancelHandle>) -> Result<Attempt>
    where
        R: ApiRequest + ?Sized,
    {
        if cancel.is_some_and(CancelHandle::is_cancelled) {
            return Err(ApiError::Cancelled);
        }

        let created_at = self.clock.now();
        let built = self.prepare(request)?;
        let dispatched_at = self.clock.now();
        let outcome = guard(cancel, self.transport.send(built.clone())).await?;
        let received_at = self.clock.now();

        let info = match &outcome {
            Ok(raw) => LogInfo {
                attempt_id: Uuid::new_v4(),
                created_at,
                dispatched_at,
                received_at,
                request: built.clone(),
                status: raw.status,
                headers: raw.headers.clone(),
                body: raw.body.clone(),
                error: None,
            },
            Err(err) => LogInfo {
                attempt_id: Uuid::new_v4(),
                created_at,
                dispatched_at,
                received_at,
                request: built.clone(),
                status: None,
                headers: Vec::new(),
                body: None,
                error: Some(err.to_string()),
            },
        };
        notify_log_decisions(&request.log_decisions(), &info);

        let raw = outcome?;
        let data = raw.body.ok_or(ApiError::NilData)?;
        let status = raw.status.ok_or(ApiError::InvalidHttpResponse)?;
        Ok(Attempt {
            request: built,
            data,
            response: HttpResponse {
                status,
                headers: raw.headers,
            },
        })
    }

    async fn decide<T>(
        &self,
        attempt: Attempt,
        decisions: &Decisions<T>,
        cancel: Option<&CancelHandle>,
    ) -> Result<Step<T>> {
        let Attempt {
            request,
            mut data,
            mut response,
        } = attempt;
        let ctx = DecisionContext {
            request: &request,
            decisions,
            decoder: &self.decoder,
        };

        for decision in decisions.iter() {
            if !decision.should_apply(&ctx, &data, &response) {
                continue;
            }
            log::trace!("decision {} applies to HTTP {}", decision.kind(), response.status);
            match guard(cancel, decision.apply(&ctx, data, response)).await? {
                DecisionAction::Continue {
                    data: next_data,
                    response: next_response,
                } => {
                    data = next_data;
                    response = next_response;
                }
                DecisionAction::Restart(next) => return Ok(Step::Restart(next)),
                DecisionAction::Error(err) => return Err(err),
                DecisionAction::Done(value) => return Ok(Step::Done(value)),
            }
        }

        panic!(
            "no decision in {decisions:?} applied to HTTP {} from {}; \
             the list must end in a catch-all decision",
            response.status,
            request.url
        );
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    decoder: JsonDecoder,
}

impl ClientBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn decoder(mut self, decoder: JsonDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn build(self) -> Client {
        Client {
            transport: self.transport,
            clock: self.clock,
            decoder: self.decoder,
        }
    }
}

fn assert_catch_all<T>(decisions: &Decisions<T>) {
    assert!(
        decisions.ends_in_catch_all(),
        "decision list {decisions:?} must end in a catch-all decision"
    );
}

/// Feed `info` to every log decision, swallowing their failures.
fn notify_log_decisions(log_decisions: &[Arc<dyn LogDecision>], info: &LogInfo) {
    for decision in log_decisions {
        match panic::catch_unwind(AssertUnwindSafe(|| decision.log(info))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("log decision failed: {err}"),
            Err(_) => log::warn!("log decision panicked"),
        }
    }
}
