//! IPC result codes

use core::fmt;

/// IPC errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// Receiver PID out of range or its queue not initialized
    InvalidReceiver,
    /// Payload length exceeds the fixed message ceiling
    MessageTooLarge,
    /// Caller is not allowed to act on this object
    PermissionDenied,
    /// Receiver's queue is at capacity; the message was dropped
    BufferFull,
    /// Timed out waiting (reserved; timeouts are unhonored this revision)
    Timeout,
    /// No message available (non-blocking receive)
    NoMessage,
    /// No such port
    InvalidPort,
    /// Port exists but is not listening
    PortClosed,
    /// Entry pool, slot table, or backing frames exhausted
    OutOfMemory,
    /// Malformed argument (name, endpoint, size)
    InvalidArgument,
    /// Duplicate port name or duplicate grant
    AlreadyExists,
    /// Region or channel lookup failed
    NotFound,
    /// IPC used before `init()`
    NotInitialized,
}

pub type Result<T> = core::result::Result<T, IpcError>;

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidReceiver => "invalid receiver",
            Self::MessageTooLarge => "message too large",
            Self::PermissionDenied => "permission denied",
            Self::BufferFull => "buffer full",
            Self::Timeout => "timeout",
            Self::NoMessage => "no message",
            Self::InvalidPort => "invalid port",
            Self::PortClosed => "port closed",
            Self::OutOfMemory => "out of memory",
            Self::InvalidArgument => "invalid argument",
            Self::AlreadyExists => "already exists",
            Self::NotFound => "not found",
            Self::NotInitialized => "IPC not initialized",
        };
        f.write_str(text)
    }
}
