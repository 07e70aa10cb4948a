//! # Error Types
//!
//! This module defines all error types used throughout the library.
//!
//! The main [`Error`] enum covers every failure mode the core can report:
//!
//! | Variant | Cause | Recoverable? |
//! |---------|-------|--------------|
//! | [`Error::InvalidArgument`] | Malformed caller input | No (fix the call) |
//! | [`Error::Busy`] | Resource already owned | Yes (release first) |
//! | [`Error::NotFound`] | Unknown channel/subscriber/id | No (check the id) |
//! | [`Error::ResourceExhausted`] | Subscriber table full | Yes (remove one) |
//! | [`Error::WouldBlock`] | Non-blocking call cannot proceed | Yes (retry or block) |
//! | [`Error::Timeout`] | Transaction deadline elapsed | Maybe (retry) |
//! | [`Error::Cancelled`] | Transaction explicitly abandoned | — |
//! | [`Error::Interrupted`] | Blocking wait aborted by close/teardown | Maybe |
//! | [`Error::NotReady`] | No driver bound, or modem not up yet | Yes (retry later) |
//! | [`Error::Decode`] | Response payload did not match its layout | No (bug/incompatibility) |
//!
//! ## Propagation Policy
//!
//! The core never panics on caller misuse — everything above is returned.
//! [`Error::Interrupted`] and [`Error::Timeout`] are deliberately distinct so
//! callers can tell "the modem never answered" apart from "the wait was torn
//! down under me".

use std::fmt;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for all library operations.
///
/// Use pattern matching to handle specific cases; see the module table for
/// which variants are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The caller passed malformed input (e.g. an empty write, a reserved id).
    InvalidArgument,

    /// The resource is already owned.
    ///
    /// Raised by a second driver registration and by a second open of a
    /// single-consumer channel or the control port.
    Busy,

    /// Unknown channel index, subscriber token, or correlation id.
    NotFound,

    /// The subscriber table is at capacity.
    ///
    /// Remove a subscriber (or raise `max_subscribers` in the config) and
    /// retry.
    ResourceExhausted,

    /// A non-blocking request cannot proceed immediately.
    ///
    /// The blocking variant of the same call would have suspended here.
    WouldBlock,

    /// The transaction deadline elapsed with no matching response.
    ///
    /// The pending entry has been removed; a late response for this
    /// correlation id is discarded.
    Timeout,

    /// The transaction was explicitly abandoned.
    ///
    /// Returned from a concurrent `wait` when `cancel` was called or the
    /// driver binding was unregistered with the exchange still in flight.
    Cancelled,

    /// A blocking wait was aborted from outside (channel or port closed,
    /// core shutting down). Distinct from [`Error::Timeout`].
    Interrupted,

    /// No driver binding is registered, or the binding is not yet able to
    /// reach the modem.
    NotReady,

    /// A response payload did not match the expected fixed layout.
    Decode(DecodeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::Busy => write!(f, "Resource busy"),
            Self::NotFound => write!(f, "Not found"),
            Self::ResourceExhausted => write!(f, "Subscriber table full"),
            Self::WouldBlock => write!(f, "Operation would block"),
            Self::Timeout => write!(f, "Transaction timed out"),
            Self::Cancelled => write!(f, "Transaction cancelled"),
            Self::Interrupted => write!(f, "Wait interrupted"),
            Self::NotReady => write!(f, "Modem not ready"),
            Self::Decode(e) => write!(f, "Decode error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {}

/// Payload-layout decode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}
