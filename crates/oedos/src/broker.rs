//! The core: kernel fabric, admission control, message routing.
//!
//! The core is the single object through which every message travels. It
//! owns one message queue and one request map per kernel slot, plus the
//! optional request register that limits how many requests of one ID may be
//! in flight per kernel. All of that state lives behind one lock, the
//! critical section; every mutating API takes it exactly once and releases
//! it before any handler runs, so handlers are free to re-enter the core.
//!
//! Sending a request is a two-phase walk over the connected kernels. The
//! control loop discovers the recipients and checks admission for each of
//! them; any full queue or exhausted register fails the whole call before
//! anything changed. Only then does the commit loop enqueue a copy into
//! every recipient's queue and wake it. A request is therefore delivered to
//! all qualifying kernels or to none.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::{CoreConfig, KERNEL_START};
use crate::error::Error;
use crate::kernel::Kernel;
use crate::message::{KernelId, Message, MessageHandler, MessageHeader, RequestId};
use crate::port::{NopPort, Port};
use crate::queue::MessageQueue;
use crate::registry::RequestMap;
use crate::sync::{Arc, Lock};
use crate::trace::{self, TraceHook};

/// Per-(kernel, request) admission state.
struct RequestRegisterEntry {
    /// How many requests of this ID are currently queued for the kernel.
    in_flight: usize,
    /// Cap on `in_flight`, enforced at send time.
    limit: usize,
}

/// Everything the critical section protects.
struct CoreState {
    maps: Vec<RequestMap>,
    queues: Vec<MessageQueue>,
    /// Indexed `[kernel][request]`; present only when the request limit is
    /// configured.
    registers: Option<Vec<Vec<RequestRegisterEntry>>>,
    /// Kernels connected so far; their IDs are exactly `0 .. connected`.
    connected: usize,
}

pub struct CoreBuilder {
    config: CoreConfig,
    port: Arc<dyn Port>,
    trace: Option<TraceHook>,
}

impl CoreBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            port: Arc::new(NopPort),
            trace: None,
        }
    }

    /// Installs the port supplying idle/resume and the critical-section
    /// hooks. Defaults to [`NopPort`].
    pub fn with_port(mut self, port: Arc<dyn Port>) -> Self {
        self.port = port;
        self
    }

    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Validates the configuration and allocates all queues, maps and
    /// registers up front. Nothing is allocated after this point.
    pub fn build(self) -> Result<Core, Error> {
        self.config.validate()?;

        let mut maps = Vec::with_capacity(self.config.kernels);
        let mut queues = Vec::with_capacity(self.config.kernels);
        for _ in 0..self.config.kernels {
            maps.push(RequestMap::new(
                self.config.requests,
                self.config.handler_limit,
            ));
            queues.push(MessageQueue::new(
                self.config.queue_length,
                self.config.data_size,
            ));
        }

        let registers = self.config.request_limit.map(|limit| {
            (0..self.config.kernels)
                .map(|_| {
                    (0..self.config.requests)
                        .map(|_| RequestRegisterEntry {
                            in_flight: 0,
                            limit,
                        })
                        .collect()
                })
                .collect()
        });

        Ok(Core {
            config: self.config,
            port: self.port,
            trace: self.trace,
            state: Lock::new(CoreState {
                maps,
                queues,
                registers,
                connected: 0,
            }),
        })
    }
}

pub struct Core {
    config: CoreConfig,
    port: Arc<dyn Port>,
    trace: Option<TraceHook>,
    state: Lock<CoreState>,
}

impl Core {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::new(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> CoreBuilder {
        CoreBuilder::new(config)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Connects a new kernel and hands back its handle.
    ///
    /// IDs are assigned in connection order, starting at 0.
    pub fn connect_kernel(self: &Arc<Self>) -> Result<Kernel, Error> {
        let id = self.with_state(|state| {
            if state.connected == self.config.kernels {
                return Err(Error::KernelLimitReached);
            }

            let id = KernelId(state.connected as u8);
            state.connected += 1;
            Ok(id)
        })?;

        self.emit(trace::TRACE_KERNEL_CONNECTED, &[id.0]);

        Ok(Kernel::new(id, Arc::clone(self)))
    }

    /// Sends a request to every kernel with at least one handler for its ID.
    ///
    /// `header.kernel_id` is the origin kernel and must be in range even if
    /// no response is expected. A supplied payload must be exactly
    /// `data_size` bytes. A request nobody subscribes to is dropped
    /// silently; that is not an error. On back pressure from any recipient
    /// the whole call fails and no kernel receives anything.
    pub fn send_request(
        &self,
        header: &MessageHeader,
        payload: Option<&[u8]>,
    ) -> Result<(), Error> {
        if usize::from(header.kernel_id.0) >= self.config.kernels {
            return Err(Error::KernelIdInvalid);
        }
        if usize::from(header.request_id.0) >= self.config.requests {
            return Err(Error::RequestIdInvalid);
        }
        if payload.map_or(false, |bytes| bytes.len() != self.config.data_size) {
            return Err(Error::ParameterInvalid);
        }

        let request = header.request_id;
        let recipients = self.with_state(|state| {
            // Control loop: discover recipients, check admission for each.
            let mut any_recipient = false;
            for kernel in 0..state.connected {
                if !state.maps[kernel].has_handlers(request) {
                    continue;
                }
                any_recipient = true;

                if let Some(registers) = &state.registers {
                    let entry = &registers[kernel][usize::from(request.0)];
                    if entry.in_flight == entry.limit {
                        return Err(Error::RequestLimitReached);
                    }
                }
                if state.queues[kernel].is_full() {
                    return Err(Error::MessageQueueFull);
                }
            }

            if !any_recipient {
                return Ok(0);
            }

            // Commit loop: admission holds for every recipient, so each
            // allocation below is guaranteed to succeed.
            let mut recipients = 0u8;
            for kernel in 0..state.connected {
                if !state.maps[kernel].has_handlers(request) {
                    continue;
                }

                if let Some(registers) = &mut state.registers {
                    registers[kernel][usize::from(request.0)].in_flight += 1;
                }

                let slot = state.queues[kernel]
                    .allocate()
                    .expect("admission reserved a queue slot");
                slot.fill(header, true, payload);

                self.port.resume(KernelId(kernel as u8));
                recipients += 1;
            }

            Ok(recipients)
        })?;

        if recipients > 0 {
            self.emit(
                trace::TRACE_REQUEST_SENT,
                &[request.0 as u8, (request.0 >> 8) as u8, recipients],
            );
        }

        Ok(())
    }

    /// Sends a response to the kernel recorded in `header.kernel_id`.
    ///
    /// The header must carry the response handler that will run there.
    /// Responses close an outstanding request and are therefore never
    /// admission-limited; only a full queue pushes back.
    pub fn send_response(
        &self,
        header: &MessageHeader,
        payload: Option<&[u8]>,
    ) -> Result<(), Error> {
        if usize::from(header.kernel_id.0) >= self.config.kernels {
            return Err(Error::KernelIdInvalid);
        }
        if usize::from(header.request_id.0) >= self.config.requests {
            return Err(Error::RequestIdInvalid);
        }
        if header.response_handler.is_none() {
            return Err(Error::ParameterInvalid);
        }
        if payload.map_or(false, |bytes| bytes.len() != self.config.data_size) {
            return Err(Error::ParameterInvalid);
        }

        let destination = header.kernel_id;
        self.with_state(|state| {
            let slot = state.queues[usize::from(destination.0)]
                .allocate()
                .ok_or(Error::MessageQueueFull)?;
            slot.fill(header, false, payload);

            self.port.resume(destination);
            Ok(())
        })?;

        self.emit(
            trace::TRACE_RESPONSE_SENT,
            &[
                header.request_id.0 as u8,
                (header.request_id.0 >> 8) as u8,
                destination.0,
            ],
        );

        Ok(())
    }

    /// Fetches the next message for `kernel`, called from its loop.
    ///
    /// Popping a request frees its slot in the request register. If every
    /// handler for the request was unregistered while the message sat in
    /// the queue, the message is dropped and `None` is returned; the
    /// register was still decremented, so the counter matches the queue
    /// again. The returned message is an owned copy, safe to dispatch from
    /// outside the critical section.
    pub fn next_message(&self, kernel: KernelId) -> Option<Message> {
        let index = usize::from(kernel.0);

        let (message, dropped) = self.with_state(|state| {
            if index >= state.queues.len() {
                return (None, None);
            }

            let message = match state.queues[index].pop() {
                Some(slot) => slot.clone(),
                None => return (None, None),
            };

            if message.header.is_request {
                let request = message.header.request_id;

                if let Some(registers) = &mut state.registers {
                    let entry = &mut registers[index][usize::from(request.0)];
                    if entry.in_flight > 0 {
                        entry.in_flight -= 1;
                    }
                }

                // A module may have unsubscribed after the message was
                // queued. Check again to protect state machines.
                if !state.maps[index].has_handlers(request) {
                    return (None, Some(request));
                }
            }

            (Some(message), None)
        });

        if let Some(request) = dropped {
            self.emit(
                trace::TRACE_MESSAGE_DROPPED,
                &[request.0 as u8, (request.0 >> 8) as u8, kernel.0],
            );
        }

        message
    }

    /// Publishes the built-in [`KERNEL_START`] request on behalf of
    /// `kernel`. Fails with [`Error::ParameterInvalid`] when system
    /// requests are disabled.
    pub fn send_kernel_start(&self, kernel: KernelId) -> Result<(), Error> {
        if !self.config.system_requests {
            return Err(Error::ParameterInvalid);
        }
        if usize::from(kernel.0) >= self.config.kernels {
            return Err(Error::KernelIdInvalid);
        }

        let header = MessageHeader::request(KERNEL_START, kernel);
        let mut args = vec![0u8; self.config.data_size];
        if let Some(first) = args.first_mut() {
            *first = kernel.0;
        }

        self.send_request(&header, Some(&args))
    }

    /// The number of kernels connected so far.
    pub fn connected_kernels(&self) -> usize {
        self.with_state(|state| state.connected)
    }

    /// The number of messages currently queued for `kernel`.
    pub fn queued_messages(&self, kernel: KernelId) -> usize {
        self.with_state(|state| {
            state
                .queues
                .get(usize::from(kernel.0))
                .map_or(0, MessageQueue::len)
        })
    }

    /// The in-flight count of `request` on `kernel`, or `None` when the
    /// request register is disabled.
    pub fn in_flight_requests(&self, kernel: KernelId, request: RequestId) -> Option<usize> {
        self.with_state(|state| {
            let registers = state.registers.as_ref()?;
            let entry = registers
                .get(usize::from(kernel.0))?
                .get(usize::from(request.0))?;
            Some(entry.in_flight)
        })
    }

    pub(crate) fn register_handlers(
        &self,
        kernel: KernelId,
        entries: &[(RequestId, MessageHandler)],
    ) -> Result<(), Error> {
        self.with_state(|state| state.maps[usize::from(kernel.0)].register(entries))?;

        self.emit(
            trace::TRACE_HANDLERS_REGISTERED,
            &[kernel.0, entries.len() as u8],
        );

        Ok(())
    }

    pub(crate) fn unregister_handlers(
        &self,
        kernel: KernelId,
        entries: &[(RequestId, MessageHandler)],
    ) {
        self.with_state(|state| state.maps[usize::from(kernel.0)].unregister(entries));

        self.emit(
            trace::TRACE_HANDLERS_UNREGISTERED,
            &[kernel.0, entries.len() as u8],
        );
    }

    /// Snapshot of the handlers registered for `request` on `kernel`, in
    /// registration order. Dispatch iterates the snapshot outside the
    /// critical section.
    pub(crate) fn handlers_for(
        &self,
        kernel: KernelId,
        request: RequestId,
    ) -> Vec<MessageHandler> {
        self.with_state(|state| state.maps[usize::from(kernel.0)].handlers(request).to_vec())
    }

    pub(crate) fn port(&self) -> &dyn Port {
        &*self.port
    }

    /// Runs `f` under the critical section: the port's hooks around the
    /// core's own lock. The lock is released before the port is told the
    /// section ended.
    fn with_state<R>(&self, f: impl FnOnce(&mut CoreState) -> R) -> R {
        self.port.enter_critical();
        let result = self.state.with(f);
        self.port.exit_critical();
        result
    }

    fn emit(&self, record_type: u8, payload: &[u8]) {
        if let Some(hook) = &self.trace {
            hook(record_type, payload);
        }
    }
}
