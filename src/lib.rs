// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composable error handling for gRPC servers.
//!
//! Service code fails with any error, optionally wrapped in an
//! [`AppError`] that carries an application status code and reporting
//! flags. An ordered [`HandlerChain`] classifies, reports, and maps the error,
//! and the interceptors turn whatever remains into a [`tonic::Status`].
//!
//! * [`apperror`]: the application error shim.
//! * [`handler`]: handler traits, chains, and combinators.
//! * [`interceptor`]: unary and streaming interceptors plus the recording
//!   stream.
//! * [`config`]: status-code tables read from TOML.
#![deny(unsafe_code)]

pub use gerr_apperror as apperror;
pub use gerr_config as config;
pub use gerr_handler as handler;
pub use gerr_interceptor as interceptor;

pub use gerr_apperror::{AppError, BoxError};
pub use gerr_handler::combinators;
pub use gerr_handler::{
    CallKind, CallView, ChainBuilder, HandlerChain, StatusCodeMap, StreamContext,
    StreamErrorHandler, StreamServerInfo, UnaryContext, UnaryErrorHandler, UnaryServerInfo,
    into_status,
};
pub use gerr_interceptor::{
    ChannelStream, ErrorInterceptors, RecordingStream, ServerStream, StreamErrorInterceptor,
    UnaryErrorInterceptor,
};
