//! Shared types for the ferrotls workspace.

mod error;

pub use error::{strerror, ErrorCategory, TlsError, UNKNOWN_LANGUAGE};
