//! Error types for lfs-shim.
//!
//! Every recoverable condition maps onto one slot of the lfs failure vocabulary
//! and reaches scripts as a `(nil, message, code?)` triple. Usage errors are hard
//! faults and are raised instead.

use crate::exit_codes;
use std::borrow::Cow;
use std::io;
use thiserror::Error;

/// Taxonomy slot of an error, independent of its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotSupported,
    LockContended,
    NotHeld,
    BadDescriptor,
    InvalidArgument,
    FileExists,
    Io,
    PermissionDenied,
    UnknownNative,
    /// Not a failure at all: a usage error raised to the script.
    Fault,
}

impl FailureKind {
    /// Stable upper-case name, used in CLI output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotSupported => "NOT_SUPPORTED",
            FailureKind::LockContended => "LOCK_CONTENDED",
            FailureKind::NotHeld => "NOT_HELD",
            FailureKind::BadDescriptor => "BAD_DESCRIPTOR",
            FailureKind::InvalidArgument => "INVALID_ARGUMENT",
            FailureKind::FileExists => "FILE_EXISTS",
            FailureKind::Io => "IO_ERROR",
            FailureKind::PermissionDenied => "PERMISSION_DENIED",
            FailureKind::UnknownNative => "UNKNOWN_NATIVE",
            FailureKind::Fault => "FAULT",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for lfs-shim operations.
#[derive(Error, Debug)]
pub enum LfsError {
    /// The open file exposes no accessor the active driver can lock through.
    #[error("Not supported")]
    NotSupported,

    /// Another holder owns an incompatible lock on an overlapping range.
    #[error("{message}")]
    LockContended {
        message: Cow<'static, str>,
        code: Option<i64>,
    },

    /// Unlock was requested for a range this process does not hold.
    #[error("{message}")]
    NotHeld {
        message: Cow<'static, str>,
        code: Option<i64>,
    },

    /// The descriptor or handle is closed or otherwise unusable.
    #[error("{message}")]
    BadDescriptor {
        message: Cow<'static, str>,
        code: Option<i64>,
    },

    #[error("Invalid argument")]
    InvalidArgument,

    #[error("File exists")]
    FileExists,

    #[error("{message}")]
    Io { message: String, code: Option<i64> },

    #[error("Permission denied")]
    PermissionDenied,

    /// A native error code with no dedicated slot, passed through verbatim.
    #[error("{message}")]
    UnknownNative { code: i64, message: String },

    /// Wrong argument type passed from the script.
    #[error("bad argument #{position} to '{function}' ({expected} expected, got {got})")]
    BadArgument {
        position: u8,
        function: &'static str,
        expected: &'static str,
        got: String,
    },

    /// Unrecognised lock mode string.
    #[error("{0}: invalid mode")]
    InvalidMode(&'static str),

    /// Any other usage error raised straight to the script.
    #[error("{0}")]
    Fault(String),

    /// `register` was called after the process-exit drain began.
    #[error("reclamation scheduler is shutting down")]
    ShuttingDown,

    /// Configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),
}

impl LfsError {
    /// Contention as reported by record locks and the fallback driver.
    pub fn contended() -> Self {
        LfsError::LockContended {
            message: Cow::Borrowed("Resource temporarily unavailable"),
            code: None,
        }
    }

    /// Unlock of a range with no registry entry.
    pub fn not_held() -> Self {
        LfsError::NotHeld {
            message: Cow::Borrowed("The lock is not held by this process"),
            code: None,
        }
    }

    /// Closed or invalid descriptor number.
    pub fn bad_descriptor() -> Self {
        LfsError::BadDescriptor {
            message: Cow::Borrowed("File descriptor in bad state"),
            code: Some(77),
        }
    }

    /// Pass a native code through with the host's description of it.
    pub fn native(code: i64) -> Self {
        LfsError::UnknownNative {
            code,
            message: native_message(code),
        }
    }

    /// Taxonomy slot of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            LfsError::NotSupported => FailureKind::NotSupported,
            LfsError::LockContended { .. } => FailureKind::LockContended,
            LfsError::NotHeld { .. } => FailureKind::NotHeld,
            LfsError::BadDescriptor { .. } => FailureKind::BadDescriptor,
            LfsError::InvalidArgument => FailureKind::InvalidArgument,
            LfsError::FileExists => FailureKind::FileExists,
            LfsError::Io { .. } => FailureKind::Io,
            LfsError::PermissionDenied => FailureKind::PermissionDenied,
            LfsError::UnknownNative { .. } => FailureKind::UnknownNative,
            LfsError::BadArgument { .. }
            | LfsError::InvalidMode(_)
            | LfsError::Fault(_)
            | LfsError::ShuttingDown
            | LfsError::Config(_) => FailureKind::Fault,
        }
    }

    /// Numeric code handed to scripts as the third return value, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            LfsError::LockContended { code, .. }
            | LfsError::NotHeld { code, .. }
            | LfsError::BadDescriptor { code, .. }
            | LfsError::Io { code, .. } => *code,
            LfsError::FileExists => Some(17),
            LfsError::PermissionDenied => Some(13),
            LfsError::UnknownNative { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error is raised to the script rather than returned.
    pub fn is_fault(&self) -> bool {
        self.kind() == FailureKind::Fault
    }

    /// Returns the appropriate CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            FailureKind::LockContended | FailureKind::NotHeld | FailureKind::FileExists => {
                exit_codes::LOCK_FAILURE
            }
            FailureKind::Fault | FailureKind::InvalidArgument | FailureKind::NotSupported => {
                exit_codes::USER_ERROR
            }
            _ => exit_codes::IO_FAILURE,
        }
    }
}

/// Map a host I/O error onto the failure vocabulary.
pub fn classify_io(err: &io::Error) -> LfsError {
    match err.kind() {
        io::ErrorKind::AlreadyExists => return LfsError::FileExists,
        io::ErrorKind::PermissionDenied => return LfsError::PermissionDenied,
        _ => {}
    }

    match err.raw_os_error() {
        Some(code) => classify_os_code(code),
        None => LfsError::Io {
            message: format!("Input/output error: {}", err),
            code: Some(5),
        },
    }
}

#[cfg(unix)]
fn classify_os_code(code: i32) -> LfsError {
    let fixed = |message: &str, code: i64| LfsError::Io {
        message: message.to_string(),
        code: Some(code),
    };

    match code {
        libc::EBADF => LfsError::bad_descriptor(),
        libc::EINVAL => LfsError::InvalidArgument,
        libc::EEXIST => LfsError::FileExists,
        libc::EACCES | libc::EPERM => LfsError::PermissionDenied,
        libc::ENOENT => fixed("No such file or directory", 2),
        libc::ENOTDIR => fixed("Not a directory", 20),
        libc::ENAMETOOLONG => fixed("Filename too long", 36),
        libc::ELOOP => fixed("Too many levels of symbolic links", 40),
        libc::EROFS => fixed("Read-only file system", 30),
        libc::EDQUOT => fixed("Quota exceeded", 122),
        libc::EIO => fixed("Input/output error", 5),
        other => LfsError::native(other as i64),
    }
}

#[cfg(not(unix))]
fn classify_os_code(code: i32) -> LfsError {
    const ERROR_FILE_NOT_FOUND: i32 = 2;
    const ERROR_PATH_NOT_FOUND: i32 = 3;
    const ERROR_INVALID_HANDLE: i32 = 6;
    const ERROR_INVALID_PARAMETER: i32 = 87;
    const ERROR_DIRECTORY: i32 = 267;

    match code {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => LfsError::Io {
            message: "No such file or directory".to_string(),
            code: Some(2),
        },
        ERROR_DIRECTORY => LfsError::Io {
            message: "Not a directory".to_string(),
            code: Some(20),
        },
        ERROR_INVALID_HANDLE => LfsError::BadDescriptor {
            message: Cow::Borrowed("The handle is invalid."),
            code: Some(6),
        },
        ERROR_INVALID_PARAMETER => LfsError::InvalidArgument,
        other => LfsError::native(other as i64),
    }
}

/// Host description of a native error code, without Rust's `(os error N)` suffix.
pub fn native_message(code: i64) -> String {
    let text = io::Error::from_raw_os_error(code as i32).to_string();
    match text.rfind(" (os error") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}

/// Result type alias for lfs-shim operations.
pub type Result<T> = std::result::Result<T, LfsError>;
