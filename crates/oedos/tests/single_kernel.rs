//! Single-kernel system tests: one core, one kernel, stepped with
//! `run_once` so every state transition can be observed.

use std::sync::{Arc, Mutex};

use oedos::{
    handler, Core, CoreConfig, Error, MessageHandler, MessageHeader, RequestId, KERNEL_START,
};

const REQ_TEST_0: RequestId = RequestId(1);
const REQ_TEST_1: RequestId = RequestId(2);

fn build_core(config: CoreConfig) -> Arc<Core> {
    Arc::new(Core::with_config(config).build().expect("config should be valid"))
}

fn counting_handler(count: &Arc<Mutex<usize>>) -> MessageHandler {
    let count = Arc::clone(count);
    handler(move |_, _| *count.lock().unwrap() += 1)
}

#[test]
fn connect_assigns_id_zero() {
    let core = build_core(CoreConfig::builder().system_requests(false).build());

    let kernel = core.connect_kernel().expect("first kernel should connect");
    assert_eq!(kernel.id().0, 0);
    assert_eq!(core.connected_kernels(), 1);
    assert_eq!(core.queued_messages(kernel.id()), 0);

    // The single-kernel configuration has no room for a second one.
    assert_eq!(core.connect_kernel().err(), Some(Error::KernelLimitReached));
}

#[test]
fn minimal_request_cycle() {
    // Smallest possible configuration: one kernel, one queue slot, one
    // handler per request.
    let core = build_core(
        CoreConfig::builder()
            .kernels(1)
            .requests(2)
            .queue_length(1)
            .handler_limit(1)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let count = Arc::new(Mutex::new(0));
    kernel
        .register_handlers(&[(RequestId(0), counting_handler(&count))])
        .unwrap();

    let header = MessageHeader::request(RequestId(0), kernel.id());
    core.send_request(&header, None).unwrap();
    assert_eq!(core.queued_messages(kernel.id()), 1);

    assert!(kernel.run_once());
    assert_eq!(core.queued_messages(kernel.id()), 0);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn request_limit_pushes_back() {
    let core = build_core(
        CoreConfig::builder()
            .requests(1)
            .queue_length(4)
            .request_limit(1)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let count = Arc::new(Mutex::new(0));
    kernel
        .register_handlers(&[(RequestId(0), counting_handler(&count))])
        .unwrap();

    let header = MessageHeader::request(RequestId(0), kernel.id());
    assert_eq!(core.send_request(&header, None), Ok(()));
    assert_eq!(
        core.send_request(&header, None),
        Err(Error::RequestLimitReached)
    );
    assert_eq!(core.queued_messages(kernel.id()), 1);

    // Draining the queue frees the register slot again.
    assert!(kernel.run_once());
    assert_eq!(core.send_request(&header, None), Ok(()));
}

#[test]
fn queue_capacity_pushes_back() {
    let core = build_core(
        CoreConfig::builder()
            .requests(1)
            .queue_length(1)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let count = Arc::new(Mutex::new(0));
    kernel
        .register_handlers(&[(RequestId(0), counting_handler(&count))])
        .unwrap();

    let header = MessageHeader::request(RequestId(0), kernel.id());
    assert_eq!(core.send_request(&header, None), Ok(()));
    assert_eq!(
        core.send_request(&header, None),
        Err(Error::MessageQueueFull)
    );
    assert_eq!(core.queued_messages(kernel.id()), 1);
}

#[test]
fn register_twice_then_unregister_once() {
    // Subscription is idempotent, so a double register followed by one
    // unregister leaves no handler behind.
    let core = build_core(
        CoreConfig::builder()
            .requests(3)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let count = Arc::new(Mutex::new(0));
    let entries = [(REQ_TEST_0, counting_handler(&count))];

    kernel.register_handlers(&entries).unwrap();
    kernel.register_handlers(&entries).unwrap();
    kernel.unregister_handlers(&entries);

    let header = MessageHeader::request(REQ_TEST_0, kernel.id());
    core.send_request(&header, None).unwrap();
    assert_eq!(core.queued_messages(kernel.id()), 0);

    assert!(!kernel.run_once());
    assert_eq!(*count.lock().unwrap(), 0);
}

#[test]
fn unsubscribed_request_is_not_handled() {
    let core = build_core(
        CoreConfig::builder()
            .requests(3)
            .queue_length(2)
            .handler_limit(2)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let count_0 = Arc::new(Mutex::new(0));
    let count_1 = Arc::new(Mutex::new(0));
    let subscribed = [(REQ_TEST_0, counting_handler(&count_0))];
    let unsubscribed = [(REQ_TEST_1, counting_handler(&count_1))];

    kernel.register_handlers(&subscribed).unwrap();
    kernel.register_handlers(&unsubscribed).unwrap();
    kernel.unregister_handlers(&unsubscribed);

    core.send_request(&MessageHeader::request(REQ_TEST_0, kernel.id()), None)
        .unwrap();
    core.send_request(&MessageHeader::request(REQ_TEST_1, kernel.id()), None)
        .unwrap();
    assert_eq!(core.queued_messages(kernel.id()), 1);

    while kernel.run_once() {}

    assert_eq!(*count_0.lock().unwrap(), 1);
    assert_eq!(*count_1.lock().unwrap(), 0);
}

#[test]
fn kernel_start_round_trip() {
    let core = build_core(
        CoreConfig::builder()
            .requests(3)
            .data_size(1)
            .queue_length(2)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Arc::clone(&seen);
    kernel
        .register_handlers(&[(
            KERNEL_START,
            handler(move |header, payload| {
                probe
                    .lock()
                    .unwrap()
                    .push((header.kernel_id, payload.map(<[u8]>::to_vec)));
            }),
        )])
        .unwrap();

    core.send_kernel_start(kernel.id()).unwrap();
    assert_eq!(core.queued_messages(kernel.id()), 1);
    assert!(kernel.run_once());
    assert_eq!(core.queued_messages(kernel.id()), 0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, kernel.id());
    assert_eq!(seen[0].1, Some(vec![kernel.id().0]));
}

#[test]
fn empty_payload_round_trips_header() {
    // With a zero-width data field, a present-but-empty payload still
    // arrives as a payload, distinct from no payload at all.
    let core = build_core(
        CoreConfig::builder()
            .requests(1)
            .queue_length(2)
            .data_size(0)
            .system_requests(false)
            .build(),
    );
    let kernel = core.connect_kernel().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Arc::clone(&seen);
    kernel
        .register_handlers(&[(
            RequestId(0),
            handler(move |header, payload| {
                probe.lock().unwrap().push((
                    header.is_request,
                    header.request_id,
                    header.kernel_id,
                    payload.map(<[u8]>::to_vec),
                ));
            }),
        )])
        .unwrap();

    let header = MessageHeader::request(RequestId(0), kernel.id());
    core.send_request(&header, None).unwrap();
    core.send_request(&header, Some(&[])).unwrap();
    while kernel.run_once() {}

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (true, RequestId(0), kernel.id(), None),
            (true, RequestId(0), kernel.id(), Some(vec![])),
        ]
    );
}
