//! Property tests for the routing invariants: per-kernel FIFO order and
//! all-or-nothing fan-out accounting.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use oedos::{handler, Core, CoreConfig, Kernel, MessageHeader, RequestId};

const REQUESTS: u16 = 4;

fn recording_kernel(core: &Arc<Core>) -> (Kernel, Arc<Mutex<Vec<u16>>>) {
    let kernel = core.connect_kernel().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let entries: Vec<_> = (0..REQUESTS)
        .map(|id| {
            let log = Arc::clone(&log);
            (
                RequestId(id),
                handler(move |header: &MessageHeader, _: Option<&[u8]>| {
                    log.lock().unwrap().push(header.request_id.0);
                }),
            )
        })
        .collect();
    kernel.register_handlers(&entries).unwrap();

    (kernel, log)
}

proptest! {
    /// Within one kernel, dispatch order equals send order, whatever the
    /// mix of request IDs.
    #[test]
    fn dispatch_order_equals_send_order(sequence in proptest::collection::vec(0..REQUESTS, 1..64)) {
        let core = Arc::new(
            Core::with_config(
                CoreConfig::builder()
                    .requests(usize::from(REQUESTS))
                    .queue_length(64)
                    .system_requests(false)
                    .build(),
            )
            .build()
            .unwrap(),
        );
        let (kernel, log) = recording_kernel(&core);

        for &id in &sequence {
            let header = MessageHeader::request(RequestId(id), kernel.id());
            core.send_request(&header, None).unwrap();
        }
        while kernel.run_once() {}

        prop_assert_eq!(&*log.lock().unwrap(), &sequence);
    }

    /// A successful send increments exactly the queues of the subscribing
    /// kernels by one; everyone else stays untouched.
    #[test]
    fn fan_out_reaches_exactly_the_subscribers(subscribed in proptest::collection::vec(any::<bool>(), 1..6)) {
        let kernels = subscribed.len();
        let core = Arc::new(
            Core::with_config(
                CoreConfig::builder()
                    .kernels(kernels)
                    .requests(1)
                    .queue_length(2)
                    .system_requests(false)
                    .build(),
            )
            .build()
            .unwrap(),
        );

        let handles: Vec<Kernel> = (0..kernels)
            .map(|_| core.connect_kernel().unwrap())
            .collect();
        for (kernel, subscribe) in handles.iter().zip(&subscribed) {
            if *subscribe {
                kernel
                    .register_handlers(&[(RequestId(0), handler(|_, _| {}))])
                    .unwrap();
            }
        }

        let header = MessageHeader::request(RequestId(0), handles[0].id());
        core.send_request(&header, None).unwrap();

        for (kernel, subscribe) in handles.iter().zip(&subscribed) {
            let expected = usize::from(*subscribe);
            prop_assert_eq!(core.queued_messages(kernel.id()), expected);
        }
    }

    /// Register followed by unregister returns the map to its prior state:
    /// a subsequent send reaches nobody.
    #[test]
    fn register_unregister_round_trips(batch in proptest::collection::vec(0..REQUESTS, 1..8)) {
        let core = Arc::new(
            Core::with_config(
                CoreConfig::builder()
                    .requests(usize::from(REQUESTS))
                    .queue_length(8)
                    .handler_limit(2)
                    .system_requests(false)
                    .build(),
            )
            .build()
            .unwrap(),
        );
        let kernel = core.connect_kernel().unwrap();

        let probe = handler(|_: &MessageHeader, _: Option<&[u8]>| {});
        let entries: Vec<_> = batch.iter().map(|&id| (RequestId(id), probe.clone())).collect();

        kernel.register_handlers(&entries).unwrap();
        kernel.unregister_handlers(&entries);

        for id in 0..REQUESTS {
            let header = MessageHeader::request(RequestId(id), kernel.id());
            core.send_request(&header, None).unwrap();
        }
        prop_assert_eq!(core.queued_messages(kernel.id()), 0);
    }
}
