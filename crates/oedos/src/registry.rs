//! Per-kernel map from request IDs to handler lists.
//!
//! One map node exists per request ID. A node is an ordered, bounded list of
//! handlers; dispatch walks it front to back, so handlers run in registration
//! order. Nodes use contiguous storage with shift-on-remove rather than a
//! linked structure: bounded capacity, no allocator traffic after init, and a
//! cache-friendly dispatch walk.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::Error;
use crate::message::{same_handler, MessageHandler, RequestId};

struct MapNode {
    handlers: Vec<MessageHandler>,
}

impl MapNode {
    fn contains(&self, handler: &MessageHandler) -> bool {
        self.handlers.iter().any(|h| same_handler(h, handler))
    }

    fn remove(&mut self, handler: &MessageHandler) {
        if let Some(position) = self.handlers.iter().position(|h| same_handler(h, handler)) {
            // Vec::remove shifts the survivors left, preserving their order.
            self.handlers.remove(position);
        }
    }
}

pub struct RequestMap {
    nodes: Vec<MapNode>,
    handler_limit: usize,
}

impl RequestMap {
    /// Creates an empty map with one node per request ID, each bounded to
    /// `handler_limit` handlers.
    pub fn new(requests: usize, handler_limit: usize) -> Self {
        let mut nodes = Vec::with_capacity(requests);
        for _ in 0..requests {
            nodes.push(MapNode {
                handlers: Vec::with_capacity(handler_limit),
            });
        }

        Self {
            nodes,
            handler_limit,
        }
    }

    /// Registers a batch of `(request, handler)` pairs, all or nothing.
    ///
    /// Pairs that are already registered are skipped, so re-registering is
    /// idempotent. If any request ID is out of range or any node would
    /// exceed its handler limit, the whole batch is rejected and the map is
    /// left untouched.
    pub fn register(&mut self, entries: &[(RequestId, MessageHandler)]) -> Result<(), Error> {
        // Validation pass. Counts the additions this same batch will make to
        // each node, so one call cannot overflow a node with two new
        // handlers for the same ID.
        let mut planned: BTreeMap<u16, Vec<&MessageHandler>> = BTreeMap::new();

        for (request, handler) in entries {
            let node = self
                .nodes
                .get(usize::from(request.0))
                .ok_or(Error::RequestIdInvalid)?;

            if node.contains(handler) {
                continue;
            }

            let pending = planned.entry(request.0).or_default();
            if pending.iter().any(|h| same_handler(h, handler)) {
                continue;
            }
            if node.handlers.len() + pending.len() == self.handler_limit {
                return Err(Error::HandlerLimitReached);
            }
            pending.push(handler);
        }

        // Commit pass: append the new handlers in batch order.
        for (request, handler) in entries {
            let node = &mut self.nodes[usize::from(request.0)];
            if !node.contains(handler) {
                node.handlers.push(handler.clone());
            }
        }

        Ok(())
    }

    /// Unregisters a batch of `(request, handler)` pairs, best effort.
    ///
    /// Out-of-range IDs and pairs that are not registered are skipped
    /// silently.
    pub fn unregister(&mut self, entries: &[(RequestId, MessageHandler)]) {
        for (request, handler) in entries {
            if let Some(node) = self.nodes.get_mut(usize::from(request.0)) {
                node.remove(handler);
            }
        }
    }

    /// True when at least one handler is registered for `request`.
    pub fn has_handlers(&self, request: RequestId) -> bool {
        self.nodes
            .get(usize::from(request.0))
            .map_or(false, |node| !node.handlers.is_empty())
    }

    /// The handlers registered for `request`, in registration order.
    pub fn handlers(&self, request: RequestId) -> &[MessageHandler] {
        self.nodes
            .get(usize::from(request.0))
            .map_or(&[], |node| node.handlers.as_slice())
    }

    /// The number of handlers registered for `request`.
    pub fn handler_count(&self, request: RequestId) -> usize {
        self.handlers(request).len()
    }
}
