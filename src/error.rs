//! Error types for reactor operations.
//!
//! Errors are explicit and typed. Every fallible operation returns
//! [`Result`]; kernel-level failures carry the raw `errno` so callers can
//! still reach the OS diagnostic. [`Error::to_errno`] reproduces the
//! negative-errno convention of the C-style surface this reactor models:
//! `0` is reserved for success, so an operation that fails with a raw
//! errno of `0` reports a generic `-1`.

use core::fmt;
use std::io;

/// The kind of reactor error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: negative fd, zero capacity, mask without a
    /// primary interest. Checked before any mutation.
    InvalidArgument,
    /// Operation on an fd or handle not currently registered.
    NotFound,
    /// An insert collided with an existing registration for the same fd.
    AlreadyRegistered,
    /// The kernel notification facility rejected a register, modify,
    /// unregister, or wait call.
    Port,
    /// Resource allocation failed.
    Allocation,
}

impl ErrorKind {
    /// Short static name, used by `Display`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
            Self::AlreadyRegistered => "already registered",
            Self::Port => "notification port error",
            Self::Allocation => "allocation failure",
        }
    }
}

/// The error type for reactor operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    errno: Option<i32>,
    message: Option<String>,
}

impl Error {
    /// Creates an error of the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            errno: None,
            message: None,
        }
    }

    /// Attaches a raw OS errno.
    #[must_use]
    pub const fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Shorthand for an [`ErrorKind::InvalidArgument`] error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument)
            .with_errno(libc::EINVAL)
            .with_message(msg)
    }

    /// Shorthand for an [`ErrorKind::NotFound`] error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound)
            .with_errno(libc::ENOENT)
            .with_message(msg)
    }

    /// Shorthand for a port error carrying the kernel errno.
    #[must_use]
    pub fn port(errno: i32, msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Port).with_errno(errno).with_message(msg)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the raw OS errno, if one was recorded.
    #[must_use]
    pub const fn errno(&self) -> Option<i32> {
        self.errno
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the negative errno code for this error. A missing or
    /// non-positive recorded errno collapses to `-1`.
    #[must_use]
    pub fn to_errno(&self) -> i32 {
        match self.errno {
            Some(err) if err > 0 => -err,
            _ => -1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.name())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(errno) = self.errno {
            write!(f, " (errno {errno})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyRegistered,
            io::ErrorKind::OutOfMemory => ErrorKind::Allocation,
            _ => ErrorKind::Port,
        };
        let mut out = Self::new(kind).with_message(err.to_string());
        if let Some(errno) = err.raw_os_error() {
            out = out.with_errno(errno);
        }
        out
    }
}

/// A specialized `Result` for reactor operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_message_and_errno() {
        let err = Error::port(libc::EBADF, "epoll_ctl rejected fd");
        assert_eq!(err.kind(), ErrorKind::Port);
        let text = err.to_string();
        assert!(text.contains("notification port error"), "{text}");
        assert!(text.contains("epoll_ctl rejected fd"), "{text}");
        assert!(text.contains(&libc::EBADF.to_string()), "{text}");
    }

    #[test]
    fn to_errno_negates() {
        let err = Error::port(libc::ENOENT, "gone");
        assert_eq!(err.to_errno(), -libc::ENOENT);
    }

    #[test]
    fn to_errno_zero_collapses_to_generic_failure() {
        let err = Error::new(ErrorKind::Port).with_errno(0);
        assert_eq!(err.to_errno(), -1);
        let err = Error::new(ErrorKind::Port);
        assert_eq!(err.to_errno(), -1);
    }

    #[test]
    fn from_io_error_keeps_errno() {
        let io_err = io::Error::from_raw_os_error(libc::EEXIST);
        let err: Error = io_err.into();
        assert_eq!(err.errno(), Some(libc::EEXIST));
        assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);
    }

    #[test]
    fn from_io_error_maps_kinds() {
        let err: Error = io::Error::new(io::ErrorKind::InvalidInput, "bad").into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.kind(), ErrorKind::Port);
    }

    #[test]
    fn convenience_constructors() {
        let err = Error::invalid_argument("zero capacity");
        assert_eq!(err.errno(), Some(libc::EINVAL));
        assert_eq!(err.message(), Some("zero capacity"));

        let err = Error::not_found("fd 9");
        assert_eq!(err.errno(), Some(libc::ENOENT));
    }
}
