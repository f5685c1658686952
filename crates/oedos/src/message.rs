//! Message and identifier primitives.
//!
//! The runtime models communication as *messages*: a small fixed header plus
//! an optional fixed-size payload. Every message is either a request, fanned
//! out to all kernels with a registered handler for its ID, or a response,
//! delivered point-to-point to the kernel that issued the original request.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use alloc::boxed::Box;
use alloc::vec;

use crate::sync::Arc;

/// Identifier for a request.
///
/// Request IDs are drawn from a contiguous application-defined enumeration;
/// a valid ID is strictly smaller than the configured number of requests.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u16);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REQ({:#06x})", self.0)
    }
}

/// Identifier for a kernel.
///
/// Assigned by the core when a kernel connects; stable for the program
/// lifetime.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelId(pub u8);

impl KernelId {
    /// Sentinel for a header that has not been routed yet.
    pub const NONE: Self = Self(u8::MAX);
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KERNEL({})", self.0)
    }
}

/// A message handler registered against a request ID, or embedded in a
/// request header to receive the eventual response.
///
/// Handlers are invoked with the message header and, when the message
/// carries data, the payload bytes. Handler identity is reference identity:
/// the map compares registrations with [`Arc::ptr_eq`], and holding a clone
/// of the `Arc` keeps the handler alive for as long as it stays registered.
pub type MessageHandler = Arc<dyn Fn(&MessageHeader, Option<&[u8]>) + Send + Sync>;

/// Wraps a closure into a [`MessageHandler`].
pub fn handler<F>(f: F) -> MessageHandler
where
    F: Fn(&MessageHeader, Option<&[u8]>) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub(crate) fn same_handler(a: &MessageHandler, b: &MessageHandler) -> bool {
    Arc::ptr_eq(a, b)
}

/// Metadata shared by all messages.
///
/// `kernel_id` is the *origin* kernel on a request (the kernel on which the
/// response handler will eventually run) and the *destination* kernel on a
/// response. The two flag booleans are owned by the core; it normalizes them
/// during enqueue regardless of what the producer put there.
#[derive(Clone)]
pub struct MessageHeader {
    /// Request or response.
    pub is_request: bool,
    /// Set when the message transports no payload bytes.
    pub payload_empty: bool,
    /// The ID of the request transported in this message.
    pub request_id: RequestId,
    /// Origin kernel for a request, destination kernel for a response.
    pub kernel_id: KernelId,
    /// Receives the eventual response to this request, on the origin kernel.
    pub response_handler: Option<MessageHandler>,
}

impl MessageHeader {
    /// Header for a request originating from `origin`.
    pub fn request(request_id: RequestId, origin: KernelId) -> Self {
        Self {
            is_request: true,
            payload_empty: true,
            request_id,
            kernel_id: origin,
            response_handler: None,
        }
    }

    /// Header for a request that expects a response.
    pub fn request_with_response(
        request_id: RequestId,
        origin: KernelId,
        response_handler: MessageHandler,
    ) -> Self {
        Self {
            response_handler: Some(response_handler),
            ..Self::request(request_id, origin)
        }
    }

    /// Header for a response addressed to `destination`.
    pub fn response(
        request_id: RequestId,
        destination: KernelId,
        response_handler: MessageHandler,
    ) -> Self {
        Self {
            is_request: false,
            payload_empty: true,
            request_id,
            kernel_id: destination,
            response_handler: Some(response_handler),
        }
    }
}

impl Default for MessageHeader {
    /// An empty header: an unrouted request with no payload. The sentinel
    /// IDs never pass validation, so an empty header cannot be sent as-is.
    fn default() -> Self {
        Self::request(RequestId(u16::MAX), KernelId::NONE)
    }
}

impl fmt::Debug for MessageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHeader")
            .field("is_request", &self.is_request)
            .field("payload_empty", &self.payload_empty)
            .field("request_id", &self.request_id)
            .field("kernel_id", &self.kernel_id)
            .field("response_handler", &self.response_handler.is_some())
            .finish()
    }
}

/// A queued message: header plus a fixed-width data field.
///
/// The data field is allocated once per queue slot at initialization and
/// holds exactly the configured number of payload bytes; it is never resized.
#[derive(Clone)]
pub struct Message {
    pub header: MessageHeader,
    data: Box<[u8]>,
}

impl Message {
    pub(crate) fn empty(data_size: usize) -> Self {
        Self {
            header: MessageHeader::default(),
            data: vec![0; data_size].into_boxed_slice(),
        }
    }

    /// The payload bytes, or `None` for an empty message.
    pub fn payload(&self) -> Option<&[u8]> {
        if self.header.payload_empty {
            None
        } else {
            Some(&self.data)
        }
    }

    /// Copies `header` and `payload` into this slot. The caller has already
    /// checked that the payload length matches the data field.
    pub(crate) fn fill(&mut self, header: &MessageHeader, is_request: bool, payload: Option<&[u8]>) {
        self.header = header.clone();
        self.header.is_request = is_request;
        self.header.payload_empty = payload.is_none();

        if let Some(bytes) = payload {
            self.data[..bytes.len()].copy_from_slice(bytes);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("header", &self.header)
            .field("payload", &self.payload())
            .finish()
    }
}
