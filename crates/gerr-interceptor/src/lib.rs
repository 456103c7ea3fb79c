// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unary and streaming interceptors that rewrite handler errors into
//! [`tonic::Status`] values.
//!
//! A service method delegates its body to an interceptor. The interceptor
//! runs the body, and if it fails, threads the error through the
//! corresponding [`HandlerChain`] before converting what is left with
//! [`into_status`]. Successful results are returned unchanged.
//!
//! ```no_run
//! use gerr_handler::combinators::map_status_code;
//! use gerr_handler::{AppError, BoxError, ChainBuilder, StatusCodeMap, UnaryServerInfo};
//! use gerr_interceptor::UnaryErrorInterceptor;
//! use tonic::{Code, Request, Response, Status};
//!
//! const SAY: UnaryServerInfo = UnaryServerInfo::new("/echo.Echo/Say");
//!
//! async fn say_body(request: Request<String>) -> Result<Response<String>, BoxError> {
//!     if request.get_ref().is_empty() {
//!         return Err(AppError::<i32>::msg("empty").with_status_code(400).into());
//!     }
//!     Ok(Response::new(request.into_inner()))
//! }
//!
//! async fn say(
//!     interceptor: &UnaryErrorInterceptor,
//!     request: Request<String>,
//! ) -> Result<Response<String>, Status> {
//!     interceptor.intercept(request, &SAY, say_body).await
//! }
//!
//! let map = StatusCodeMap::new(Code::Internal).with(400, Code::InvalidArgument);
//! let chain = ChainBuilder::new().both(map_status_code(map)).build();
//! let interceptor = UnaryErrorInterceptor::new(&chain);
//! # let _ = say(&interceptor, Request::new(String::new()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod recording;
mod stream;

pub use recording::RecordingStream;
pub use stream::{ChannelStream, ServerStream};

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use gerr_handler::{
    BoxError, HandlerChain, StreamChain, StreamContext, StreamErrorHandler, StreamServerInfo,
    UnaryChain, UnaryContext, UnaryErrorHandler, UnaryServerInfo, into_status,
};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

fn as_any<T: Any + Send + Sync>(message: &T) -> &(dyn Any + Send + Sync) {
    message
}

fn rejected(status: Status, method: &'static str, shape: &'static str) -> Status {
    debug!(
        rpc.method = method,
        rpc.kind = shape,
        rpc.code = ?status.code(),
        "call failed"
    );
    status
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Unary
// ---------------------------------------------------------------------------

/// Error interceptor for single-request, single-response calls.
#[derive(Debug, Clone)]
pub struct UnaryErrorInterceptor {
    chain: UnaryChain,
}

impl UnaryErrorInterceptor {
    /// Use the unary half of `chain`.
    pub fn new(chain: &HandlerChain) -> Self {
        Self::from_chain(chain.unary().clone())
    }

    /// Use an already built unary chain.
    pub fn from_chain(chain: UnaryChain) -> Self {
        Self { chain }
    }

    /// Build the chain from an ordered list of handlers.
    pub fn with_handlers(handlers: Vec<Arc<dyn UnaryErrorHandler>>) -> Self {
        Self::from_chain(UnaryChain::new(handlers))
    }

    /// Run `next` and rewrite its error.
    ///
    /// When the chain has handlers, the request message and metadata are
    /// cloned before `next` consumes the request so handlers can inspect
    /// them. That clone happens on every call, successful or not, so large
    /// messages pay for it; an empty chain skips it. When the chain resolves
    /// the error entirely, the client receives `Resp::default()`.
    pub async fn intercept<Req, Resp, F, Fut>(
        &self,
        request: Request<Req>,
        info: &UnaryServerInfo,
        next: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Clone + Send + Sync + 'static,
        Resp: Default,
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, BoxError>>,
    {
        if self.chain.is_empty() {
            return next(request)
                .await
                .map_err(|err| rejected(into_status(err), info.full_method, "unary"));
        }

        let metadata = request.metadata().clone();
        let message = request.get_ref().clone();

        let err = match next(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let ctx = UnaryContext {
            metadata: &metadata,
            request: as_any(&message),
            info,
        };
        match self.chain.handle(&ctx, Some(err)) {
            Some(err) => Err(rejected(into_status(err), info.full_method, "unary")),
            None => Ok(Response::new(Resp::default())),
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Error interceptor for client, server, and bidirectional streaming calls.
#[derive(Debug, Clone)]
pub struct StreamErrorInterceptor {
    chain: StreamChain,
}

impl StreamErrorInterceptor {
    /// Use the stream half of `chain`.
    pub fn new(chain: &HandlerChain) -> Self {
        Self::from_chain(chain.stream().clone())
    }

    /// Use an already built stream chain.
    pub fn from_chain(chain: StreamChain) -> Self {
        Self { chain }
    }

    /// Build the chain from an ordered list of handlers.
    pub fn with_handlers(handlers: Vec<Arc<dyn StreamErrorHandler>>) -> Self {
        Self::from_chain(StreamChain::new(handlers))
    }

    /// Run `next` over a recording wrapper of `stream` and rewrite its error.
    ///
    /// Handlers see the last message received and the last message sent
    /// before the failure. A resolved error completes the call with `Ok(())`.
    pub async fn intercept<S, F>(
        &self,
        stream: S,
        info: &StreamServerInfo,
        next: F,
    ) -> Result<(), Status>
    where
        S: ServerStream,
        S::Request: Clone + Sync,
        S::Response: Clone + Sync,
        F: for<'a> FnOnce(&'a mut RecordingStream<S>) -> BoxFuture<'a, Result<(), BoxError>>,
    {
        let mut recording = RecordingStream::new(stream);

        let err = match next(&mut recording).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let ctx = StreamContext {
            metadata: recording.metadata(),
            request: recording.last_request().map(as_any),
            response: recording.last_response().map(as_any),
            info,
        };
        match self.chain.handle(&ctx, Some(err)) {
            Some(err) => Err(rejected(into_status(err), info.full_method, "stream")),
            None => Ok(()),
        }
    }

    /// Run a streaming call on its own task over a [`ChannelStream`].
    ///
    /// Returns the response stream to hand back to tonic. A rewritten error
    /// is delivered as the final item of that stream. A panic in the body or
    /// in a handler is delivered as an `INTERNAL` status.
    pub fn spawn<Req, Resp, In, F>(
        &self,
        request: Request<In>,
        info: StreamServerInfo,
        buffer: usize,
        next: F,
    ) -> ReceiverStream<Result<Resp, Status>>
    where
        Req: Clone + Send + Sync + 'static,
        Resp: Clone + Send + Sync + 'static,
        In: Stream<Item = Result<Req, Status>> + Send + 'static,
        F: for<'a> FnOnce(
                &'a mut RecordingStream<ChannelStream<Req, Resp>>,
            ) -> BoxFuture<'a, Result<(), BoxError>>
            + Send
            + 'static,
    {
        let (stream, responses) = ChannelStream::channel(request, buffer);
        let errors = stream.sender();
        let interceptor = self.clone();
        tokio::spawn(async move {
            let call = AssertUnwindSafe(interceptor.intercept(stream, &info, next));
            let outcome = match call.catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    warn!(
                        rpc.method = info.full_method,
                        error = %panic_message(payload.as_ref()),
                        "stream call panicked"
                    );
                    Err(Status::internal("stream handler panicked"))
                }
            };
            if let Err(status) = outcome {
                if errors.send(Err(status)).await.is_err() {
                    debug!(rpc.method = info.full_method, "client gone before error delivery");
                }
            }
        });
        responses
    }
}

/// Both interceptors built from one [`HandlerChain`].
#[derive(Debug, Clone)]
pub struct ErrorInterceptors {
    /// Interceptor for unary calls.
    pub unary: UnaryErrorInterceptor,
    /// Interceptor for streaming calls.
    pub stream: StreamErrorInterceptor,
}

impl From<&HandlerChain> for ErrorInterceptors {
    fn from(chain: &HandlerChain) -> Self {
        Self {
            unary: UnaryErrorInterceptor::new(chain),
            stream: StreamErrorInterceptor::new(chain),
        }
    }
}

impl From<HandlerChain> for ErrorInterceptors {
    fn from(chain: HandlerChain) -> Self {
        Self::from(&chain)
    }
}
