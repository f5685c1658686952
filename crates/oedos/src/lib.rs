#![doc = r#"# oedos

A clean-room, idiomatic Rust port of the [OpenEDOS](https://github.com/SamuelArdayaLieb/OpenEDOS)
core: an event-driven micro-runtime in which independent modules communicate
only through typed request/response messages routed by a central broker. The
crate compiles in both `std` and `no_std` (+`alloc`) environments.

## Module Overview
- [`message`]  – Identifier, header and message primitives.
- [`queue`]    – Bounded FIFO message queue, one per kernel.
- [`registry`] – Per-kernel map from request IDs to handler lists.
- [`broker`]   – The core: kernel fabric, admission control, message routing.
- [`kernel`]   – The kernel main loop: fetch, dispatch, suspend.
- [`port`]     – The five-operation seam towards hardware or a host OS.
- [`config`]   – Runtime configuration of the compile-time constants.
- [`trace`]    – Lightweight trace hook for observing core activity.

The crate keeps modules loosely coupled so that alternative ports can reuse
the same primitives.
"#]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod broker;
pub mod config;
pub mod error;
pub mod kernel;
pub mod message;
pub mod port;
pub mod queue;
pub mod registry;
mod sync;
pub mod trace;

pub use broker::{Core, CoreBuilder};
pub use config::{CoreConfig, CoreConfigBuilder, KERNEL_START};
pub use error::Error;
pub use kernel::Kernel;
pub use message::{handler, KernelId, Message, MessageHandler, MessageHeader, RequestId};
pub use port::{NopPort, Port};
pub use trace::TraceHook;

#[cfg(test)]
mod tests;
