use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use futures::Stream;
use pin_project_lite::pin_project;
use tonic::{Code, Request, Response, Status};
use tracing::{Instrument, Span};

use super::call::{describe, CallInfo};
use super::outcome::{Classify, Outcome};
use crate::logger::Logger;
use crate::operation::OperationContext;
use crate::record::{Field, FieldValue};
use crate::schema::{HttpRequest, HTTP_REQUEST_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Stream,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Unary => "unary",
            CallKind::Stream => "stream",
        })
    }
}

/// Wraps single-request, single-response handlers.
#[derive(Debug, Clone)]
pub struct UnaryServerInterceptor {
    inner: Interceptor,
}

/// Wraps streaming handlers.
///
/// Use [`intercept_streaming`](Self::intercept_streaming) when the handler
/// returns a response stream, so the outcome is logged once the stream is
/// exhausted. [`intercept`](Self::intercept) suits handlers that consume a
/// client stream before returning.
#[derive(Debug, Clone)]
pub struct StreamServerInterceptor {
    inner: Interceptor,
}

pub fn unary_server_interceptor(logger: Logger) -> UnaryServerInterceptor {
    UnaryServerInterceptor {
        inner: Interceptor { logger, kind: CallKind::Unary },
    }
}

pub fn stream_server_interceptor(logger: Logger) -> StreamServerInterceptor {
    StreamServerInterceptor {
        inner: Interceptor { logger, kind: CallKind::Stream },
    }
}

impl UnaryServerInterceptor {
    /// Run `handler` for `call`, logging its arrival and its outcome.
    ///
    /// The handler's result is returned untouched.
    pub async fn intercept<T, E, F, Fut>(&self, call: CallInfo, handler: F) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.inner.intercept(call, handler).await
    }

    /// [`intercept`](Self::intercept) for a `tonic` request/response handler.
    pub async fn intercept_request<Req, Res, F, Fut>(
        &self,
        full_method: &str,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<Res>, Status>
    where
        F: FnOnce(OperationContext, Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Res>, Status>>,
    {
        let call = CallInfo::from_request(full_method, &request);
        self.inner.intercept(call, move |ctx| handler(ctx, request)).await
    }
}

impl StreamServerInterceptor {
    /// Run `handler` for `call`, logging its arrival and its outcome.
    ///
    /// The handler's result is returned untouched.
    pub async fn intercept<T, E, F, Fut>(&self, call: CallInfo, handler: F) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.inner.intercept(call, handler).await
    }

    /// Run a server-streaming `handler` for `call`.
    ///
    /// When the handler fails, the outcome is logged right away. Otherwise
    /// the response stream is wrapped and the last entry is written when it
    /// yields its first error or ends, with latency covering the exchange.
    pub async fn intercept_streaming<S, T, F, Fut>(
        &self,
        call: CallInfo,
        handler: F,
    ) -> Result<Response<ObservedStream<S>>, Status>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<Response<S>, Status>>,
        S: Stream<Item = Result<T, Status>>,
    {
        let (mut pending, span) = self.inner.begin(&call);

        match handler(pending.ctx).instrument(span.clone()).await {
            Ok(response) => Ok(response.map(|inner| ObservedStream { inner, span, pending })),
            Err(status) => {
                pending.finish(status.classify());
                Err(status)
            }
        }
    }

    /// [`intercept_streaming`](Self::intercept_streaming) for a `tonic` request.
    pub async fn intercept_streaming_request<Req, S, T, F, Fut>(
        &self,
        full_method: &str,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<ObservedStream<S>>, Status>
    where
        F: FnOnce(OperationContext, Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<S>, Status>>,
        S: Stream<Item = Result<T, Status>>,
    {
        let call = CallInfo::from_request(full_method, &request);
        self.intercept_streaming(call, move |ctx| handler(ctx, request)).await
    }
}

pin_project! {
    /// Response stream of an intercepted call. Items pass through unchanged;
    /// the call's last entry is written on the first error, at the end of
    /// the stream, or as cancelled if the stream is dropped before either.
    pub struct ObservedStream<S> {
        #[pin]
        inner: S,
        span: Span,
        pending: PendingCall,
    }
}

impl<S, T> Stream for ObservedStream<S>
where
    S: Stream<Item = Result<T, Status>>,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();

        let item = ready!(this.inner.poll_next(cx));
        match &item {
            Some(Ok(_)) => {}
            Some(Err(status)) => this.pending.finish(status.classify()),
            None => this.pending.finish(Outcome::Success),
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> fmt::Debug for ObservedStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedStream")
            .field("operation", &self.pending.ctx.id())
            .field("finished", &self.pending.request.is_none())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Interceptor {
    logger: Logger,
    kind: CallKind,
}

impl Interceptor {
    async fn intercept<T, E, F, Fut>(&self, call: CallInfo, handler: F) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let (mut pending, span) = self.begin(&call);

        let result = handler(pending.ctx).instrument(span).await;

        pending.finish(Outcome::of(&result));
        result
    }

    /// Log the arrival of `call` and open its operation.
    ///
    /// The span is created at error level so that no level filter disables
    /// it; `tracing` events inside it are correlated through its id.
    fn begin(&self, call: &CallInfo) -> (PendingCall, Span) {
        let start = Instant::now();
        let request = describe(call);
        let ctx = OperationContext::background().with_operation();

        self.logger.debug(
            &format!("grpc {} request received by the server", self.kind),
            [
                Field::object(HTTP_REQUEST_KEY, request.clone()),
                ctx.first("").into_field(),
            ],
        );

        let span = tracing::error_span!(
            "grpc_call",
            operation.id = %ctx.id().unwrap_or_default(),
            grpc.method = %call.full_method
        );
        let pending = PendingCall {
            interceptor: self.clone(),
            ctx,
            start,
            request: Some(request),
        };
        (pending, span)
    }

    fn log_outcome(&self, ctx: &OperationContext, mut request: HttpRequest, outcome: Outcome) {
        let kind = self.kind;
        match outcome {
            Outcome::Success => {
                request.status = Some(i32::from(Code::Ok));
                self.log_success(ctx, request);
            }
            Outcome::CodedFailure { code, message } => {
                request.status = Some(i32::from(code));
                match code {
                    Code::Ok => self.log_success(ctx, request),
                    Code::Internal => self.logger.error(
                        &format!("grpc {} request processed by the server with error", kind),
                        [
                            Field::object(HTTP_REQUEST_KEY, request),
                            ctx.last("").into_field(),
                            Field::string("error", message),
                        ],
                    ),
                    _ => self.logger.warn(
                        &format!(
                            "grpc {} request processed by the server but something went wrong",
                            kind
                        ),
                        [Field::object(HTTP_REQUEST_KEY, request), ctx.last("").into_field()],
                    ),
                }
            }
            Outcome::UncodedFailure { message } => self.logger.error(
                "grpc request processed by the server with unhandled error",
                [
                    Field::object(HTTP_REQUEST_KEY, request),
                    ctx.last("").into_field(),
                    Field::new("error", FieldValue::Error(message)),
                ],
            ),
        }
    }

    fn log_success(&self, ctx: &OperationContext, request: HttpRequest) {
        self.logger.debug(
            "grpc request processed by the server successfully",
            [Field::object(HTTP_REQUEST_KEY, request), ctx.last("").into_field()],
        );
    }
}

/// A call whose outcome is not known yet.
///
/// If it is dropped unfinished (the client went away or the deadline
/// passed), the last entry is still written, as a cancelled call.
struct PendingCall {
    interceptor: Interceptor,
    ctx: OperationContext,
    start: Instant,
    request: Option<HttpRequest>,
}

impl PendingCall {
    fn finish(&mut self, outcome: Outcome) {
        if let Some(mut request) = self.request.take() {
            request.latency = self.start.elapsed();
            self.interceptor.log_outcome(&self.ctx, request, outcome);
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.finish(Outcome::CodedFailure {
            code: Code::Cancelled,
            message: "call dropped before it completed".to_string(),
        });
    }
}
