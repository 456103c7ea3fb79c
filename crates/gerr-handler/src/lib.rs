// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error handler traits, handler chains, and classification combinators.
//!
//! An error leaving an RPC handler is threaded through an ordered
//! [`HandlerChain`]. Each handler may pass the error on, replace it, or
//! return `None` to resolve it entirely, which stops the chain. Handlers
//! declare which call shapes they serve by implementing
//! [`UnaryErrorHandler`], [`StreamErrorHandler`], or both; the
//! [`ChainBuilder`] sorts them into two independent chains.
//!
//! Most handlers are built from the combinators in [`combinators`], which do
//! the application-error classification once so the callback only carries
//! domain logic:
//!
//! ```
//! use gerr_handler::combinators::{handle_not_wrapped, map_status_code};
//! use gerr_handler::{ChainBuilder, StatusCodeMap};
//! use tonic::Code;
//!
//! let chain = ChainBuilder::new()
//!     .both(handle_not_wrapped::<i32, _>(|_view, err| Some(err)))
//!     .both(map_status_code(StatusCodeMap::new(Code::Internal).with(50, Code::PermissionDenied)))
//!     .build();
//! assert_eq!(chain.unary().len(), 2);
//! assert_eq!(chain.stream().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod combinators;
mod status_map;

pub use chain::{ChainBuilder, HandlerChain, StreamChain, UnaryChain};
pub use gerr_apperror::{AppError, BoxError};
pub use status_map::StatusCodeMap;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tonic::Status;
use tonic::metadata::MetadataMap;

// ---------------------------------------------------------------------------
// Call info
// ---------------------------------------------------------------------------

/// Static description of a unary method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnaryServerInfo {
    /// Fully qualified method path, e.g. `/pkg.Service/Method`.
    pub full_method: &'static str,
}

impl UnaryServerInfo {
    /// Describe the unary method at `full_method`.
    pub const fn new(full_method: &'static str) -> Self {
        Self { full_method }
    }
}

/// Static description of a streaming method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamServerInfo {
    /// Fully qualified method path, e.g. `/pkg.Service/Method`.
    pub full_method: &'static str,
    /// The client sends a stream of requests.
    pub client_streaming: bool,
    /// The server sends a stream of responses.
    pub server_streaming: bool,
}

impl StreamServerInfo {
    /// Describe a bidirectional streaming method.
    pub const fn bidi(full_method: &'static str) -> Self {
        Self {
            full_method,
            client_streaming: true,
            server_streaming: true,
        }
    }

    /// Describe a client-streaming method.
    pub const fn client_streaming(full_method: &'static str) -> Self {
        Self {
            full_method,
            client_streaming: true,
            server_streaming: false,
        }
    }

    /// Describe a server-streaming method.
    pub const fn server_streaming(full_method: &'static str) -> Self {
        Self {
            full_method,
            client_streaming: false,
            server_streaming: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Which interceptor produced a [`CallView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Single request, single response.
    Unary,
    /// Client, server, or bidirectional streaming.
    Stream,
}

/// Everything a unary error handler can see about the failed call.
pub struct UnaryContext<'a> {
    /// Request metadata.
    pub metadata: &'a MetadataMap,
    /// The request message.
    pub request: &'a (dyn Any + Send + Sync),
    /// Static method info.
    pub info: &'a UnaryServerInfo,
}

impl<'a> UnaryContext<'a> {
    /// The request message, if it is a `T`.
    pub fn request<T: Any>(&self) -> Option<&'a T> {
        self.request.downcast_ref::<T>()
    }

    /// Shape-independent view of this context.
    pub fn view(&self) -> CallView<'a> {
        CallView {
            metadata: self.metadata,
            full_method: self.info.full_method,
            kind: CallKind::Unary,
        }
    }
}

impl fmt::Debug for UnaryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryContext")
            .field("metadata", self.metadata)
            .field("info", self.info)
            .finish_non_exhaustive()
    }
}

/// Everything a stream error handler can see about the failed call.
///
/// Only the most recent message in each direction is kept.
pub struct StreamContext<'a> {
    /// Request metadata.
    pub metadata: &'a MetadataMap,
    /// Last message received from the client, if any.
    pub request: Option<&'a (dyn Any + Send + Sync)>,
    /// Last message sent to the client, if any.
    pub response: Option<&'a (dyn Any + Send + Sync)>,
    /// Static method info.
    pub info: &'a StreamServerInfo,
}

impl<'a> StreamContext<'a> {
    /// The last received message, if there was one and it is a `T`.
    pub fn request<T: Any>(&self) -> Option<&'a T> {
        self.request.and_then(|m| m.downcast_ref::<T>())
    }

    /// The last sent message, if there was one and it is a `T`.
    pub fn response<T: Any>(&self) -> Option<&'a T> {
        self.response.and_then(|m| m.downcast_ref::<T>())
    }

    /// Shape-independent view of this context.
    pub fn view(&self) -> CallView<'a> {
        CallView {
            metadata: self.metadata,
            full_method: self.info.full_method,
            kind: CallKind::Stream,
        }
    }
}

impl fmt::Debug for StreamContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext")
            .field("metadata", self.metadata)
            .field("has_request", &self.request.is_some())
            .field("has_response", &self.response.is_some())
            .field("info", self.info)
            .finish()
    }
}

/// The part of a call context shared by unary and streaming calls.
#[derive(Debug, Clone, Copy)]
pub struct CallView<'a> {
    /// Request metadata.
    pub metadata: &'a MetadataMap,
    /// Fully qualified method path.
    pub full_method: &'static str,
    /// Call shape.
    pub kind: CallKind,
}

// ---------------------------------------------------------------------------
// Handler traits
// ---------------------------------------------------------------------------

/// Handles errors returned from unary calls.
///
/// Return `Some` to pass an error (the same or a replacement) to the next
/// handler, or `None` to resolve the error and stop the chain.
pub trait UnaryErrorHandler: Send + Sync {
    /// Examine `err` raised by the call described by `ctx`.
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError>;
}

/// Handles errors returned from streaming calls.
///
/// Same contract as [`UnaryErrorHandler`].
pub trait StreamErrorHandler: Send + Sync {
    /// Examine `err` raised by the call described by `ctx`.
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError>;
}

impl<H: UnaryErrorHandler + ?Sized> UnaryErrorHandler for Arc<H> {
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError> {
        (**self).handle_unary(ctx, err)
    }
}

impl<H: StreamErrorHandler + ?Sized> StreamErrorHandler for Arc<H> {
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError> {
        (**self).handle_stream(ctx, err)
    }
}

// ---------------------------------------------------------------------------
// Transport conversion
// ---------------------------------------------------------------------------

/// Convert the error left at the end of a chain into the status sent to the
/// client.
///
/// A [`Status`] is surfaced as-is. Anything else becomes [`tonic::Code::Unknown`]
/// carrying the error's display text.
pub fn into_status(err: BoxError) -> Status {
    match err.downcast::<Status>() {
        Ok(status) => *status,
        Err(other) => Status::unknown(other.to_string()),
    }
}
