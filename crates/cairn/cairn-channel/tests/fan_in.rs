//! Hub and merge driven together from several threads.
//!
//! ```bash
//! cargo test -p cairn-channel --test fan_in
//! ```

use cairn_channel::{CancelToken, Hub, HubConfig, RecvTimeoutError, merge};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);
const PER_PRODUCER: u32 = 200;

#[test]
fn merged_clients_of_two_hubs_see_every_broadcast() {
    let cancel = CancelToken::new();
    let config = HubConfig {
        broadcast_buffer: 32,
        client_buffer: 0,
    };
    let hubs = [Hub::new(&cancel, config), Hub::new(&cancel, config)];
    let merged = merge(hubs.iter().map(|h| h.register().into_receiver()));

    thread::scope(|s| {
        for (n, hub) in hubs.iter().enumerate() {
            s.spawn(move || {
                for i in 0..PER_PRODUCER {
                    hub.broadcast(n as u32 * PER_PRODUCER + i);
                }
            });
        }

        let mut seen = HashSet::new();
        for _ in 0..2 * PER_PRODUCER {
            let v = merged.recv_timeout(WAIT).unwrap();
            assert!(seen.insert(v), "{v} delivered twice");
        }
        assert_eq!(seen.len(), 2 * PER_PRODUCER as usize);
    });

    cancel.cancel();
}

#[test]
fn churn_does_not_stall_the_loop() {
    let cancel = CancelToken::new();
    let hub = Hub::<u32>::new(&cancel, HubConfig::with_buffer(8));
    let steady = hub.register();

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..100 {
                let c = hub.register();
                hub.release(c);
            }
        });
        s.spawn(|| {
            for i in 0..PER_PRODUCER {
                hub.broadcast(i);
            }
        });

        let mut last = None;
        for _ in 0..PER_PRODUCER {
            let v = steady.recv_timeout(WAIT).unwrap();
            assert!(last.is_none_or(|prev| prev < v), "out of order");
            last = Some(v);
        }
    });

    assert_eq!(hub.subscribers(), 1);
    hub.release(steady);
    assert_eq!(hub.subscribers(), 0);
    cancel.cancel();
}

#[test]
fn cancelled_hub_refuses_new_work() {
    let cancel = CancelToken::new();
    let hub = Hub::<u32>::new(&cancel, HubConfig::default());
    let before = hub.register();

    cancel.cancel();
    assert!(hub.is_stopped());

    let after = hub.register();
    assert_eq!(after.recv_timeout(WAIT), Err(RecvTimeoutError::Disconnected));

    hub.broadcast(1);
    hub.unregister(&before);
    assert_eq!(
        before.recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );
}
