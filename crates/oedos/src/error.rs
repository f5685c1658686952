//! The error codes returned by the mutating core APIs.

use core::fmt;

/// Every fallible core operation returns one of these.
///
/// Back-pressure variants (`MessageQueueFull`, `RequestLimitReached`) are
/// expected in normal operation and are the producer's contract to handle;
/// they leave no observable mutation behind. Validation variants likewise
/// leave the core untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `connect_kernel` was called after the configured kernel capacity.
    KernelLimitReached,
    /// A map node cannot take another handler.
    HandlerLimitReached,
    /// A recipient's per-request in-flight limit is exhausted.
    RequestLimitReached,
    /// A recipient's message queue is full.
    MessageQueueFull,
    /// Request ID out of range.
    RequestIdInvalid,
    /// Kernel ID out of range.
    KernelIdInvalid,
    /// Malformed header, payload length mismatch, or invalid configuration.
    ParameterInvalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelLimitReached => write!(f, "kernel limit reached"),
            Self::HandlerLimitReached => write!(f, "handler limit reached"),
            Self::RequestLimitReached => write!(f, "request limit reached"),
            Self::MessageQueueFull => write!(f, "message queue full"),
            Self::RequestIdInvalid => write!(f, "request id out of range"),
            Self::KernelIdInvalid => write!(f, "kernel id out of range"),
            Self::ParameterInvalid => write!(f, "invalid parameter"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
