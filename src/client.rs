//! Public entry point: streaming with retries, falling back to one buffered call.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{DEFAULT_BODY_EXCERPT_LIMIT, InvokeError};
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use crate::request::{InvocationMode, InvocationRequest};
use crate::retry::{RetryCoordinator, RetryPlan};
use crate::scope::CallScope;
use crate::session::StreamingSession;
use crate::single_shot::SingleShotInvoker;
use crate::transport::{Endpoint, HttpOptions, HttpTransport, Transport};
use crate::wire::WireFormat;

/// Construction-time configuration of an [`InvocationClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoint: Endpoint,
    pub wire: WireFormat,
    pub retry: RetryPlan,
    /// Re-issue an exhausted streaming invocation as one buffered call.
    pub fallback_to_single_shot: bool,
    pub body_excerpt_limit: usize,
}

impl ClientOptions {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            wire: WireFormat::default(),
            retry: RetryPlan::default(),
            fallback_to_single_shot: true,
            body_excerpt_limit: DEFAULT_BODY_EXCERPT_LIMIT,
        }
    }
}

pub struct InvocationClient {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    observer: Arc<dyn Observer>,
    single_shot: SingleShotInvoker,
    retry: RetryCoordinator,
}

impl InvocationClient {
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self::assemble(transport, options, Arc::new(NoopObserver))
    }

    /// Client over the reqwest transport.
    pub fn http(options: ClientOptions, http: HttpOptions) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(http)?;
        Ok(Self::new(Arc::new(transport), options))
    }

    pub fn with_observer(self, observer: Arc<dyn Observer>) -> Self {
        Self::assemble(self.transport, self.options, observer)
    }

    fn assemble(
        transport: Arc<dyn Transport>,
        options: ClientOptions,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let single_shot = SingleShotInvoker::new(
            Arc::clone(&transport),
            options.endpoint.clone(),
            options.wire.clone(),
        )
        .with_body_excerpt_limit(options.body_excerpt_limit)
        .with_observer(Arc::clone(&observer));
        let retry = RetryCoordinator::new(options.retry.clone()).with_observer(Arc::clone(&observer));

        Self {
            transport,
            options,
            observer,
            single_shot,
            retry,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn invoke(&self, request: &InvocationRequest) -> Result<String, InvokeError> {
        self.invoke_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`invoke`](Self::invoke), aborting when `cancel` fires.
    #[instrument(
        skip_all,
        fields(
            operation = request.operation(),
            session_id = request.session_id(),
            mode = %request.mode(),
        )
    )]
    pub async fn invoke_with_cancel(
        &self,
        request: &InvocationRequest,
        cancel: CancellationToken,
    ) -> Result<String, InvokeError> {
        let scope = CallScope::new(cancel, request.deadline());
        let started = Instant::now();

        let result = match request.mode() {
            InvocationMode::Buffered => self.single_shot.invoke(request, &scope).await,
            InvocationMode::Incremental => self.invoke_streaming(request, &scope).await,
        };

        self.observer
            .record_metric(&ObserverMetric::InvocationLatency(started.elapsed()));
        match &result {
            Ok(text) => debug!(text_len = text.len(), "invocation completed"),
            Err(e) => warn!(kind = %e.kind(), error = %e, "invocation failed"),
        }
        result
    }

    async fn invoke_streaming(
        &self,
        request: &InvocationRequest,
        scope: &CallScope,
    ) -> Result<String, InvokeError> {
        let payload = self.options.wire.build_payload(request, true);
        let mut attempts = 0;

        let streamed = self
            .retry
            .run(scope, |attempt| {
                attempts = attempt;
                StreamingSession::new(
                    Arc::clone(&self.transport),
                    self.options.endpoint.clone(),
                    request,
                    payload.clone(),
                    attempt,
                )
                .with_body_excerpt_limit(self.options.body_excerpt_limit)
                .with_observer(Arc::clone(&self.observer))
                .run(scope)
            })
            .await;

        let err = match streamed {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        if !err.allows_fallback() {
            return Err(err);
        }
        if !self.options.fallback_to_single_shot {
            return Err(InvokeError::RetriesExhausted {
                attempts,
                source: Box::new(err),
            });
        }

        warn!(
            attempts,
            cause = %err.kind(),
            error = %err,
            "streaming failed; re-issuing as single-shot call"
        );
        self.observer
            .record_event(&ObserverEvent::FallbackEngaged { cause: err.kind() });

        self.single_shot.invoke(request, scope).await
    }
}
