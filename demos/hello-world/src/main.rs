//! Minimal oedos embedding.
//!
//! A single kernel hosts one module, the printer. On `KERNEL_START` the
//! printer greets the world by issuing a print request to itself; the print
//! handler writes whatever payload arrives. The main loop drains the kernel
//! step by step, so the program terminates once the system goes quiet.

use std::sync::Arc;

use oedos::{handler, Core, CoreConfig, Error, Kernel, MessageHeader, RequestId, KERNEL_START};
use oedos_posix::{stdout_backend, trace_hook};

/// Application request IDs; 0 is reserved for `KERNEL_START`.
const REQ_PRINT: RequestId = RequestId(1);

const DATA_SIZE: usize = 32;

/// The printer module: subscribes to `KERNEL_START` and `REQ_PRINT`.
struct Printer;

impl Printer {
    fn init(kernel: &Kernel) -> Result<(), Error> {
        let core = Arc::clone(kernel.core());
        let origin = kernel.id();
        let on_start = handler(move |_, _| {
            let mut text = [0u8; DATA_SIZE];
            let greeting = b"Hello, world!";
            text[..greeting.len()].copy_from_slice(greeting);

            let header = MessageHeader::request(REQ_PRINT, origin);
            if let Err(error) = core.send_request(&header, Some(&text)) {
                eprintln!("printer: greeting not sent: {error}");
            }
        });

        let on_print = handler(|_, payload: Option<&[u8]>| {
            if let Some(bytes) = payload {
                let text = bytes.split(|&b| b == 0).next().unwrap_or(bytes);
                println!("{}", String::from_utf8_lossy(text));
            }
        });

        kernel.register_handlers(&[(KERNEL_START, on_start), (REQ_PRINT, on_print)])
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::builder()
        .kernels(1)
        .requests(2)
        .queue_length(4)
        .data_size(DATA_SIZE)
        .handler_limit(2)
        .build();

    let core = Arc::new(
        Core::with_config(config)
            .with_trace_hook(trace_hook(stdout_backend()))
            .build()?,
    );

    let kernel = core.connect_kernel()?;
    Printer::init(&kernel)?;

    core.send_kernel_start(kernel.id())?;
    while kernel.run_once() {}

    Ok(())
}
