//! The kernel main loop: fetch, dispatch, suspend.
//!
//! A kernel is one consumer context. It owns no state of its own beyond its
//! ID; its queue and its request map live inside the core, and the handle
//! here is the capability to drive them. An application typically gives
//! each kernel its own thread (or RTOS task) running [`Kernel::run`], while
//! module init code uses the same handle to register its handlers.

use core::fmt;

use crate::broker::Core;
use crate::error::Error;
use crate::message::{KernelId, Message, MessageHandler, RequestId};
use crate::sync::Arc;

/// Handle to one connected kernel.
///
/// Minted by [`Core::connect_kernel`]; cloning the handle shares the same
/// kernel.
#[derive(Clone)]
pub struct Kernel {
    id: KernelId,
    core: Arc<Core>,
}

impl Kernel {
    pub(crate) fn new(id: KernelId, core: Arc<Core>) -> Self {
        Self { id, core }
    }

    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Registers message handlers for this kernel, all or nothing.
    ///
    /// Modules call this at init time or at any point during operation.
    /// Once registered, a handler runs on this kernel whenever a matching
    /// request is dispatched. Registering a pair that is already present
    /// has no effect.
    pub fn register_handlers(
        &self,
        entries: &[(RequestId, MessageHandler)],
    ) -> Result<(), Error> {
        self.core.register_handlers(self.id, entries)
    }

    /// Unregisters message handlers, best effort.
    ///
    /// The counterpart to [`Kernel::register_handlers`]; unknown pairs and
    /// out-of-range IDs are skipped. Once a handler is removed, requests
    /// already queued for it are dropped at pop time.
    pub fn unregister_handlers(&self, entries: &[(RequestId, MessageHandler)]) {
        self.core.unregister_handlers(self.id, entries);
    }

    /// The kernel main routine. Loops forever: fetch the next message,
    /// dispatch it, and suspend through the port when the queue is empty.
    ///
    /// When system requests are enabled, publishes
    /// [`KERNEL_START`](crate::KERNEL_START) once on entry so subscribers
    /// can observe the activation; an error on that send returns early.
    pub fn run(&self) {
        if self.core.config().system_requests && self.core.send_kernel_start(self.id).is_err() {
            return;
        }

        loop {
            match self.core.next_message(self.id) {
                Some(message) => self.handle_message(&message),
                None => self.core.port().idle(self.id),
            }
        }
    }

    /// Runs a single cycle of the main routine, without suspension.
    ///
    /// Fetches and dispatches at most one message and reports whether one
    /// was handled. Useful for tests that step the system message by
    /// message, and for embeddings that drive the kernel from their own
    /// loop.
    pub fn run_once(&self) -> bool {
        match self.core.next_message(self.id) {
            Some(message) => {
                self.handle_message(&message);
                true
            }
            None => false,
        }
    }

    /// Dispatches one message. Runs outside the critical section, so
    /// handlers may send further requests and responses.
    fn handle_message(&self, message: &Message) {
        if message.header.is_request {
            let handlers = self
                .core
                .handlers_for(self.id, message.header.request_id);

            for handler in &handlers {
                handler(&message.header, message.payload());
            }
        } else if let Some(handler) = &message.header.response_handler {
            handler(&message.header, message.payload());
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel").field("id", &self.id).finish()
    }
}
