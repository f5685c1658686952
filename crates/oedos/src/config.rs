//! Runtime configuration of the core.
//!
//! The embedding application fixes these values once, before the core is
//! built. They are the runtime equivalents of the compile-time constants a
//! bare-metal deployment would bake in.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::RequestId;

/// The reserved system request published by [`Kernel::run`](crate::Kernel::run)
/// on entry when [`CoreConfig::system_requests`] is enabled. Application
/// request IDs start at 1 in that case. The first payload byte carries the
/// starting kernel's ID when the data field is non-empty.
pub const KERNEL_START: RequestId = RequestId(0);

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Number of kernels the core can connect, `1 ..= 255`.
    pub kernels: usize,
    /// Number of request IDs, `0 ..= 65 535`; valid IDs are `0 .. requests`.
    pub requests: usize,
    /// Capacity of each kernel's message queue, at least 1.
    pub queue_length: usize,
    /// Width of every message data field in bytes.
    pub data_size: usize,
    /// Maximum handlers per `(kernel, request)` node, at least 1.
    pub handler_limit: usize,
    /// When set, caps how many requests of one ID may be queued per kernel
    /// at a time; must be at least 1. `None` disables the request register.
    pub request_limit: Option<usize>,
    /// Enables the built-in [`KERNEL_START`] request.
    pub system_requests: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kernels: 1,
            requests: 1,
            queue_length: 1,
            data_size: 0,
            handler_limit: 1,
            request_limit: None,
            system_requests: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.kernels < 1 || self.kernels > usize::from(u8::MAX) {
            return Err(Error::ParameterInvalid);
        }
        if self.requests > usize::from(u16::MAX) {
            return Err(Error::ParameterInvalid);
        }
        if self.queue_length < 1 {
            return Err(Error::ParameterInvalid);
        }
        if self.handler_limit < 1 {
            return Err(Error::ParameterInvalid);
        }
        if self.request_limit == Some(0) {
            return Err(Error::ParameterInvalid);
        }
        if self.system_requests && self.requests < 1 {
            return Err(Error::ParameterInvalid);
        }

        Ok(())
    }
}

pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    pub fn kernels(mut self, kernels: usize) -> Self {
        self.config.kernels = kernels;
        self
    }

    pub fn requests(mut self, requests: usize) -> Self {
        self.config.requests = requests;
        self
    }

    pub fn queue_length(mut self, queue_length: usize) -> Self {
        self.config.queue_length = queue_length;
        self
    }

    pub fn data_size(mut self, data_size: usize) -> Self {
        self.config.data_size = data_size;
        self
    }

    pub fn handler_limit(mut self, handler_limit: usize) -> Self {
        self.config.handler_limit = handler_limit;
        self
    }

    pub fn request_limit(mut self, request_limit: usize) -> Self {
        self.config.request_limit = Some(request_limit);
        self
    }

    pub fn system_requests(mut self, enabled: bool) -> Self {
        self.config.system_requests = enabled;
        self
    }

    pub fn build(self) -> CoreConfig {
        self.config
    }
}
