// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application error shim consumed by the grpc-errors middleware.
//!
//! Service code raises [`AppError`] values: an underlying cause tagged with a
//! domain status code and two flags. `reportable` marks errors that need
//! external notice; `ignorable` marks errors that should never be reported.
//! The middleware only ever looks at an error through [`unwrap`] and
//! [`find`] and the accessors on [`AppError`], so the status-code type `C` is
//! left to the application (numeric codes, string tags, or a domain enum).
//!
//! ```
//! use gerr_apperror::{AppError, BoxError};
//!
//! let err: BoxError = Box::new(AppError::<i32>::msg("quota exceeded").with_status_code(429));
//! let app = gerr_apperror::unwrap::<i32>(err).ok().unwrap();
//! assert_eq!(*app.status_code(), 429);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::error::Error as StdError;
use std::fmt;

/// Type-erased error value threaded through the middleware.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Application-level error tagged with a status code and reporting flags.
pub struct AppError<C = i32> {
    cause: BoxError,
    status_code: C,
    reportable: bool,
    ignorable: bool,
}

impl<C: Default> AppError<C> {
    /// Wrap `cause` with the default status code and both flags cleared.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            cause: cause.into(),
            status_code: C::default(),
            reportable: false,
            ignorable: false,
        }
    }

    /// Create an error whose cause is a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }
}

impl<C> AppError<C> {
    /// Set the domain status code.
    pub fn with_status_code(mut self, code: C) -> Self {
        self.status_code = code;
        self
    }

    /// Mark the error as requiring external notice.
    pub fn with_report(mut self) -> Self {
        self.reportable = true;
        self
    }

    /// Mark the error as safe to ignore by reporters.
    pub fn with_ignore(mut self) -> Self {
        self.ignorable = true;
        self
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Consume the error and return its cause.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }

    /// The domain status code.
    pub fn status_code(&self) -> &C {
        &self.status_code
    }

    /// Whether the error should be reported.
    pub fn is_reportable(&self) -> bool {
        self.reportable
    }

    /// Whether reporters should skip the error.
    pub fn is_ignorable(&self) -> bool {
        self.ignorable
    }
}

impl<C: fmt::Debug> fmt::Debug for AppError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("cause", &self.cause.to_string())
            .field("status_code", &self.status_code)
            .field("reportable", &self.reportable)
            .field("ignorable", &self.ignorable)
            .finish()
    }
}

impl<C> fmt::Display for AppError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl<C: fmt::Debug> StdError for AppError<C> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref() as &(dyn StdError + 'static))
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Take ownership of the [`AppError`] carried by `err`.
///
/// Never fails in the sense of losing data: when `err` is not an
/// `AppError<C>` it is handed back untouched in `Err`.
pub fn unwrap<C>(err: BoxError) -> Result<Box<AppError<C>>, BoxError>
where
    C: fmt::Debug + Send + Sync + 'static,
{
    err.downcast::<AppError<C>>()
}

/// Borrow the first [`AppError`] found in `err` or its `source()` chain.
pub fn find<'a, C>(err: &'a (dyn StdError + 'static)) -> Option<&'a AppError<C>>
where
    C: fmt::Debug + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(app) = e.downcast_ref::<AppError<C>>() {
            return Some(app);
        }
        current = e.source();
    }
    None
}

/// Convert any error into an [`AppError`], reusing it if it already is one.
pub fn wrap<C>(err: impl Into<BoxError>) -> AppError<C>
where
    C: Default + fmt::Debug + Send + Sync + 'static,
{
    match unwrap::<C>(err.into()) {
        Ok(app) => *app,
        Err(other) => AppError::new(other),
    }
}

/// Wrap `err` and set its status code.
pub fn with_status_code<C>(err: impl Into<BoxError>, code: C) -> AppError<C>
where
    C: Default + fmt::Debug + Send + Sync + 'static,
{
    wrap(err).with_status_code(code)
}

/// Wrap `err` and mark it reportable.
pub fn with_report<C>(err: impl Into<BoxError>) -> AppError<C>
where
    C: Default + fmt::Debug + Send + Sync + 'static,
{
    wrap(err).with_report()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
