// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered, short-circuiting handler chains.

use crate::{BoxError, StreamContext, StreamErrorHandler, UnaryContext, UnaryErrorHandler};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// UnaryChain
// ---------------------------------------------------------------------------

/// Immutable sequence of unary error handlers.
///
/// Cloning is cheap; clones share the same handler list.
#[derive(Clone)]
pub struct UnaryChain {
    handlers: Arc<[Arc<dyn UnaryErrorHandler>]>,
}

impl UnaryChain {
    /// Build a chain that applies `handlers` in order.
    pub fn new(handlers: Vec<Arc<dyn UnaryErrorHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// Thread `err` through every handler in order.
    ///
    /// A `None` input returns `None` without touching any handler. The first
    /// handler that returns `None` ends the chain.
    pub fn handle(&self, ctx: &UnaryContext<'_>, err: Option<BoxError>) -> Option<BoxError> {
        let mut err = err?;
        for (index, handler) in self.handlers.iter().enumerate() {
            trace!(rpc.method = ctx.info.full_method, handler = index, "unary error handler");
            match handler.handle_unary(ctx, err) {
                Some(next) => err = next,
                None => {
                    debug!(
                        rpc.method = ctx.info.full_method,
                        handler = index,
                        "unary error resolved by handler"
                    );
                    return None;
                }
            }
        }
        Some(err)
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for UnaryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryChain")
            .field("len", &self.handlers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StreamChain
// ---------------------------------------------------------------------------

/// Immutable sequence of stream error handlers.
#[derive(Clone)]
pub struct StreamChain {
    handlers: Arc<[Arc<dyn StreamErrorHandler>]>,
}

impl StreamChain {
    /// Build a chain that applies `handlers` in order.
    pub fn new(handlers: Vec<Arc<dyn StreamErrorHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// Thread `err` through every handler in order. Same rules as
    /// [`UnaryChain::handle`].
    pub fn handle(&self, ctx: &StreamContext<'_>, err: Option<BoxError>) -> Option<BoxError> {
        let mut err = err?;
        for (index, handler) in self.handlers.iter().enumerate() {
            trace!(rpc.method = ctx.info.full_method, handler = index, "stream error handler");
            match handler.handle_stream(ctx, err) {
                Some(next) => err = next,
                None => {
                    debug!(
                        rpc.method = ctx.info.full_method,
                        handler = index,
                        "stream error resolved by handler"
                    );
                    return None;
                }
            }
        }
        Some(err)
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for StreamChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamChain")
            .field("len", &self.handlers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects handlers by capability and produces a [`HandlerChain`].
///
/// Registration order is preserved independently for each chain.
#[derive(Default)]
pub struct ChainBuilder {
    unary: Vec<Arc<dyn UnaryErrorHandler>>,
    stream: Vec<Arc<dyn StreamErrorHandler>>,
}

impl ChainBuilder {
    /// Start with empty chains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the unary chain only.
    pub fn unary<H: UnaryErrorHandler + 'static>(mut self, handler: H) -> Self {
        self.unary.push(Arc::new(handler));
        self
    }

    /// Append a handler to the stream chain only.
    pub fn stream<H: StreamErrorHandler + 'static>(mut self, handler: H) -> Self {
        self.stream.push(Arc::new(handler));
        self
    }

    /// Append one shared handler instance to both chains.
    pub fn both<H>(mut self, handler: H) -> Self
    where
        H: UnaryErrorHandler + StreamErrorHandler + 'static,
    {
        let handler = Arc::new(handler);
        self.unary.push(handler.clone());
        self.stream.push(handler);
        self
    }

    /// Freeze the registered handlers.
    pub fn build(self) -> HandlerChain {
        HandlerChain {
            unary: UnaryChain::new(self.unary),
            stream: StreamChain::new(self.stream),
        }
    }
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("unary", &self.unary.len())
            .field("stream", &self.stream.len())
            .finish()
    }
}

/// The unary and stream chains produced by one [`ChainBuilder`].
#[derive(Debug, Clone)]
pub struct HandlerChain {
    unary: UnaryChain,
    stream: StreamChain,
}

impl HandlerChain {
    /// Start a new builder.
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// The chain used for unary calls.
    pub fn unary(&self) -> &UnaryChain {
        &self.unary
    }

    /// The chain used for streaming calls.
    pub fn stream(&self) -> &StreamChain {
        &self.stream
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
