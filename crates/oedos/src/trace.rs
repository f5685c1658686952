//! Lightweight trace hook for observing core activity.
//!
//! When a hook is installed, the core emits a record at each state
//! transition: a record type plus a compact byte payload. Ports adapt the
//! hook onto whatever sink they have (stdout, a socket, a trace buffer).

use crate::sync::Arc;

/// Receives `(record_type, payload)` for every emitted record.
pub type TraceHook = Arc<dyn Fn(u8, &[u8]) + Send + Sync>;

/// A kernel connected; payload: `[kernel_id]`.
pub const TRACE_KERNEL_CONNECTED: u8 = 1;
/// A request was accepted; payload: `[request_lo, request_hi, recipients]`.
pub const TRACE_REQUEST_SENT: u8 = 2;
/// A response was enqueued; payload: `[request_lo, request_hi, kernel_id]`.
pub const TRACE_RESPONSE_SENT: u8 = 3;
/// A popped request had no handlers left; payload: `[request_lo, request_hi, kernel_id]`.
pub const TRACE_MESSAGE_DROPPED: u8 = 4;
/// Handlers were registered; payload: `[kernel_id, count]`.
pub const TRACE_HANDLERS_REGISTERED: u8 = 5;
/// Handlers were unregistered; payload: `[kernel_id, count]`.
pub const TRACE_HANDLERS_UNREGISTERED: u8 = 6;
