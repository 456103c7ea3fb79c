// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constructors that turn narrow callbacks into full error handlers.
//!
//! The shape-independent combinators ([`handle_not_wrapped`],
//! [`handle_app_error`] and everything built on them) implement both
//! [`UnaryErrorHandler`] and [`StreamErrorHandler`] and hand their callback a
//! [`CallView`]. The `unary_*` and `stream_*` constructors serve a single
//! call shape and pass the full context, including request and response
//! messages.
//!
//! Every callback follows the chain contract: return `Some` to continue with
//! that error, `None` to resolve it.

use crate::{
    AppError, BoxError, CallView, StatusCodeMap, StreamContext, StreamErrorHandler, UnaryContext,
    UnaryErrorHandler,
};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use tonic::{Code, Status};
use tracing::trace;

/// Erase an application error back into the chain's error type.
fn erase<C>(err: Box<AppError<C>>) -> BoxError
where
    C: fmt::Debug + Send + Sync + 'static,
{
    err
}

// ---------------------------------------------------------------------------
// Not-wrapped errors
// ---------------------------------------------------------------------------

/// Handler that only sees errors which are not an `AppError<C>`.
///
/// Built by [`handle_not_wrapped`].
pub struct NotWrapped<C, F> {
    f: F,
    _code: PhantomData<fn() -> C>,
}

/// Call `f` for errors that were never classified as an `AppError<C>`.
///
/// Application errors pass through untouched. Typical callbacks log the raw
/// error and optionally wrap it so later handlers can classify it.
pub fn handle_not_wrapped<C, F>(f: F) -> NotWrapped<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    NotWrapped {
        f,
        _code: PhantomData,
    }
}

impl<C, F> NotWrapped<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    fn apply(&self, view: &CallView<'_>, err: BoxError) -> Option<BoxError> {
        if err.is::<AppError<C>>() {
            return Some(err);
        }
        (self.f)(view, err)
    }
}

impl<C, F> UnaryErrorHandler for NotWrapped<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError> {
        self.apply(&ctx.view(), err)
    }
}

impl<C, F> StreamErrorHandler for NotWrapped<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError> {
        self.apply(&ctx.view(), err)
    }
}

impl<C, F> fmt::Debug for NotWrapped<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotWrapped").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Application errors
// ---------------------------------------------------------------------------

/// Handler that only sees `AppError<C>` values.
///
/// Built by [`handle_app_error`] and the combinators layered on it.
pub struct OnAppError<C, F> {
    f: F,
    _code: PhantomData<fn() -> C>,
}

/// Call `f` with the unwrapped [`AppError`] when the error is one.
///
/// Any other error passes through untouched and `f` is not called.
pub fn handle_app_error<C, F>(f: F) -> OnAppError<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    OnAppError {
        f,
        _code: PhantomData,
    }
}

impl<C, F> OnAppError<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    fn apply(&self, view: &CallView<'_>, err: BoxError) -> Option<BoxError> {
        match gerr_apperror::unwrap::<C>(err) {
            Ok(app) => (self.f)(view, app),
            Err(other) => Some(other),
        }
    }
}

impl<C, F> UnaryErrorHandler for OnAppError<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError> {
        self.apply(&ctx.view(), err)
    }
}

impl<C, F> StreamErrorHandler for OnAppError<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError> {
        self.apply(&ctx.view(), err)
    }
}

impl<C, F> fmt::Debug for OnAppError<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnAppError").finish_non_exhaustive()
    }
}

/// Call `f` only for application errors marked reportable.
pub fn report<C, F>(
    f: F,
) -> OnAppError<C, impl Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    handle_app_error(move |view: &CallView<'_>, err: Box<AppError<C>>| {
        if err.is_reportable() {
            f(view, err)
        } else {
            Some(erase(err))
        }
    })
}

/// Call `f` for every application error except those marked ignorable.
pub fn report_unless_ignorable<C, F>(
    f: F,
) -> OnAppError<C, impl Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    handle_app_error(move |view: &CallView<'_>, err: Box<AppError<C>>| {
        if err.is_ignorable() {
            Some(erase(err))
        } else {
            f(view, err)
        }
    })
}

/// Replace application errors with a [`Status`] whose code comes from `map`.
///
/// The status message is the application error's message. Codes missing
/// from the table use [`StatusCodeMap::fallback`].
pub fn map_status_code<C>(
    map: StatusCodeMap<C>,
) -> OnAppError<C, impl Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync>
where
    C: Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    handle_app_error(move |view: &CallView<'_>, err: Box<AppError<C>>| {
        let code = map.resolve(err.status_code());
        trace!(
            rpc.method = view.full_method,
            app.code = ?err.status_code(),
            rpc.code = ?code,
            "mapped application status code"
        );
        let status: BoxError = Box::new(Status::new(code, err.to_string()));
        Some(status)
    })
}

/// Replace application errors with a [`Status`] whose code is `f(status_code)`.
///
/// `f` must cover every status code; there is no fallback.
pub fn map_status_code_with<C, F>(
    f: F,
) -> OnAppError<C, impl Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&C) -> Code + Send + Sync,
{
    handle_app_error(move |_view: &CallView<'_>, err: Box<AppError<C>>| {
        let status: BoxError = Box::new(Status::new(f(err.status_code()), err.to_string()));
        Some(status)
    })
}

/// Surface an application error's cause as-is when it already is a [`Status`].
///
/// Place this before a status-mapping handler to let an explicit transport
/// status win over a derived one.
pub fn unwrap_grpc_status<C>()
-> OnAppError<C, impl Fn(&CallView<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync>
where
    C: fmt::Debug + Send + Sync + 'static,
{
    handle_app_error(|_view: &CallView<'_>, err: Box<AppError<C>>| {
        if err.cause().is::<Status>() {
            Some((*err).into_cause())
        } else {
            Some(erase(err))
        }
    })
}

// ---------------------------------------------------------------------------
// Shape-specific handlers
// ---------------------------------------------------------------------------

/// Unary-only handler for application errors, with the full unary context.
pub struct UnaryAppErrorHandler<C, F> {
    f: F,
    _code: PhantomData<fn() -> C>,
}

/// Call `f` with the request context and the unwrapped [`AppError`].
pub fn unary_app_error_handler<C, F>(f: F) -> UnaryAppErrorHandler<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&UnaryContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    UnaryAppErrorHandler {
        f,
        _code: PhantomData,
    }
}

/// Like [`unary_app_error_handler`], restricted to reportable errors.
pub fn unary_reportable_handler<C, F>(
    f: F,
) -> UnaryAppErrorHandler<
    C,
    impl Fn(&UnaryContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&UnaryContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    unary_app_error_handler(move |ctx: &UnaryContext<'_>, err: Box<AppError<C>>| {
        if err.is_reportable() {
            f(ctx, err)
        } else {
            Some(erase(err))
        }
    })
}

impl<C, F> UnaryErrorHandler for UnaryAppErrorHandler<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&UnaryContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError> {
        match gerr_apperror::unwrap::<C>(err) {
            Ok(app) => (self.f)(ctx, app),
            Err(other) => Some(other),
        }
    }
}

impl<C, F> fmt::Debug for UnaryAppErrorHandler<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryAppErrorHandler").finish_non_exhaustive()
    }
}

/// Stream-only handler for application errors, with the recorded messages.
pub struct StreamAppErrorHandler<C, F> {
    f: F,
    _code: PhantomData<fn() -> C>,
}

/// Call `f` with the stream context and the unwrapped [`AppError`].
pub fn stream_app_error_handler<C, F>(f: F) -> StreamAppErrorHandler<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&StreamContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    StreamAppErrorHandler {
        f,
        _code: PhantomData,
    }
}

/// Like [`stream_app_error_handler`], restricted to reportable errors.
pub fn stream_reportable_handler<C, F>(
    f: F,
) -> StreamAppErrorHandler<
    C,
    impl Fn(&StreamContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&StreamContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    stream_app_error_handler(move |ctx: &StreamContext<'_>, err: Box<AppError<C>>| {
        if err.is_reportable() {
            f(ctx, err)
        } else {
            Some(erase(err))
        }
    })
}

impl<C, F> StreamErrorHandler for StreamAppErrorHandler<C, F>
where
    C: fmt::Debug + Send + Sync + 'static,
    F: Fn(&StreamContext<'_>, Box<AppError<C>>) -> Option<BoxError> + Send + Sync,
{
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError> {
        match gerr_apperror::unwrap::<C>(err) {
            Ok(app) => (self.f)(ctx, app),
            Err(other) => Some(other),
        }
    }
}

impl<C, F> fmt::Debug for StreamAppErrorHandler<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAppErrorHandler").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Plain closures
// ---------------------------------------------------------------------------

/// A unary handler backed by a closure.
pub struct UnaryFn<F>(F);

/// Lift `f` into a [`UnaryErrorHandler`].
pub fn unary_fn<F>(f: F) -> UnaryFn<F>
where
    F: Fn(&UnaryContext<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    UnaryFn(f)
}

impl<F> UnaryErrorHandler for UnaryFn<F>
where
    F: Fn(&UnaryContext<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    fn handle_unary(&self, ctx: &UnaryContext<'_>, err: BoxError) -> Option<BoxError> {
        (self.0)(ctx, err)
    }
}

/// A stream handler backed by a closure.
pub struct StreamFn<F>(F);

/// Lift `f` into a [`StreamErrorHandler`].
pub fn stream_fn<F>(f: F) -> StreamFn<F>
where
    F: Fn(&StreamContext<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    StreamFn(f)
}

impl<F> StreamErrorHandler for StreamFn<F>
where
    F: Fn(&StreamContext<'_>, BoxError) -> Option<BoxError> + Send + Sync,
{
    fn handle_stream(&self, ctx: &StreamContext<'_>, err: BoxError) -> Option<BoxError> {
        (self.0)(ctx, err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
