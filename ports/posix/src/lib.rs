//! POSIX-specific utilities for hosting the oedos core.
//!
//! On a hosted platform every kernel runs on its own OS thread and suspends
//! on a condition variable while its queue is empty. [`PosixPort`] supplies
//! the idle/resume pair; [`spawn_kernel`] wires a kernel handle onto a
//! thread. The crate also provides simple line-oriented trace backends for
//! the core's trace hook.

use std::io::{self, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use oedos::{Kernel, KernelId, Port, TraceHook};

/// One wake slot per kernel. `pending` records a resume that arrived while
/// the kernel was not (yet) waiting, so wake signals are never lost.
struct WakeSlot {
    pending: Mutex<bool>,
    resume: Condvar,
}

/// Condition-variable backed port for hosted deployments.
///
/// `resume` may be called from any thread, including from inside the core's
/// critical section; it only touches the per-kernel wake slot. A resume
/// issued before the kernel enters idle is consumed by the next idle call.
pub struct PosixPort {
    slots: Vec<WakeSlot>,
}

impl PosixPort {
    /// Creates a port with one wake slot per kernel.
    pub fn new(kernels: usize) -> Self {
        let mut slots = Vec::with_capacity(kernels);
        for _ in 0..kernels {
            slots.push(WakeSlot {
                pending: Mutex::new(false),
                resume: Condvar::new(),
            });
        }

        Self { slots }
    }
}

impl Port for PosixPort {
    fn idle(&self, kernel: KernelId) {
        let Some(slot) = self.slots.get(usize::from(kernel.0)) else {
            return;
        };

        let mut pending = slot.pending.lock().expect("wake slot poisoned");
        while !*pending {
            pending = slot.resume.wait(pending).expect("wake slot poisoned");
        }
        *pending = false;
    }

    fn resume(&self, kernel: KernelId) {
        let Some(slot) = self.slots.get(usize::from(kernel.0)) else {
            return;
        };

        *slot.pending.lock().expect("wake slot poisoned") = true;
        slot.resume.notify_one();
    }
}

/// Runs `kernel`'s main routine on its own OS thread.
///
/// The kernel loop never returns on its own; the handle is mostly useful to
/// keep the thread from being detached silently.
pub fn spawn_kernel(kernel: Kernel) -> JoinHandle<()> {
    thread::spawn(move || kernel.run())
}

/// Errors that can occur while emitting trace records.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("backend error: {0}")]
    Backend(#[from] io::Error),
}

/// Backend trait that consumes trace records.
pub trait TraceBackend: Send + Sync {
    fn write_record(&self, record_type: u8, payload: &[u8]) -> Result<(), TraceError>;
}

/// Simple backend that writes one line per record to any `Write`
/// implementation.
pub struct WriterBackend<W: Write + Send + 'static> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterBackend<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send + 'static> TraceBackend for WriterBackend<W> {
    fn write_record(&self, record_type: u8, payload: &[u8]) -> Result<(), TraceError> {
        let mut guard = self.writer.lock().expect("trace writer poisoned");
        writeln!(guard, "oedos[{record_type:03}] {payload:02x?}").map_err(TraceError::from)
    }
}

/// Backend that streams records to stdout.
pub fn stdout_backend() -> WriterBackend<io::Stdout> {
    WriterBackend::new(io::stdout())
}

/// Adapts a backend onto the core's trace hook. Emission failures are
/// swallowed; tracing never disturbs the runtime.
pub fn trace_hook<B: TraceBackend + 'static>(backend: B) -> TraceHook {
    let backend = Arc::new(backend);
    Arc::new(move |record_type, payload| {
        let _ = backend.write_record(record_type, payload);
    })
}
