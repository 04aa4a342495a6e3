//! In-process broadcast hub with a dynamic subscriber registry.
//!
//! A [`Hub`] fans every broadcast value out to all currently registered
//! [`Client`]s. It is the change-notification backbone of eventful
//! containers, but it is generic and usable on its own.
//!
//! # Design
//! - **Control loop**: one dedicated thread owns the subscriber table. It is
//!   the only code that ever inserts into or removes from it.
//! - **Commands**: `register`/`unregister` are request/response rendezvous
//!   with the loop; the caller returns once the loop has applied the change.
//! - **Broadcasts**: queued on a bounded channel (`broadcast_buffer`) and
//!   delivered by the loop, one subscriber at a time, with a blocking send.
//!
//! ```text
//!   register ──┐
//! unregister ──┼──▶ [control loop] ──send──▶ client 1
//!  broadcast ──┘    (owns table)   ──send──▶ client 2
//!      cancel ─────────▲           ──send──▶ ...
//! ```
//!
//! # Back-pressure
//! Delivery has no timeout. A subscriber that stops draining its channel
//! stalls delivery to everyone after it and stalls every queued command until
//! it reads again. Calling `unregister` for a client from the very thread that
//! is supposed to drain it, while the loop is blocked on it, deadlocks.
//!
//! # Lifecycle
//! The loop serves until the [`CancelToken`] fires (or every hub handle is
//! dropped), then stops. Stopping does not close subscriber channels: they are
//! parked and stay open until the last hub handle goes away. Only
//! `unregister` closes a channel while the hub is alive.

use crate::cancel::CancelToken;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, select};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Sizing of the hub's queues.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Broadcasts that may queue before `broadcast` blocks.
    #[serde(default = "defaults::broadcast_buffer")]
    pub broadcast_buffer: usize,
    /// Capacity of each client channel. 0 makes every delivery a rendezvous.
    #[serde(default = "defaults::client_buffer")]
    pub client_buffer: usize,
}

mod defaults {
    pub fn broadcast_buffer() -> usize {
        16
    }

    pub fn client_buffer() -> usize {
        0
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer: defaults::broadcast_buffer(),
            client_buffer: defaults::client_buffer(),
        }
    }
}

impl HubConfig {
    pub fn with_buffer(broadcast_buffer: usize) -> Self {
        Self {
            broadcast_buffer,
            ..Self::default()
        }
    }
}

/// Identity of a subscriber within one hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Receiving end of one subscription.
///
/// The channel reports disconnection once the client has been unregistered
/// (after any values already queued for it are drained).
pub struct Client<T> {
    id: ClientId,
    rx: Receiver<T>,
}

impl<T> Client<T> {
    #[inline]
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn recv(&self) -> Result<T, RecvError> {
        self.rx.recv()
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Blocking iterator that ends when the channel is closed.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, T> {
        self.rx.iter()
    }

    /// Gives up the client identity and keeps only the channel, e.g. to feed
    /// it into [`merge`](crate::merge).
    pub fn into_receiver(self) -> Receiver<T> {
        self.rx
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("queued", &self.rx.len())
            .finish()
    }
}

enum Command<T> {
    Register {
        id: ClientId,
        tx: Sender<T>,
        ack: Sender<()>,
    },
    Unregister {
        id: ClientId,
        ack: Sender<()>,
    },
}

/// Handle to a running broadcast hub. Clones share the same control loop.
pub struct Hub<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    commands: Sender<Command<T>>,
    broadcasts: Sender<T>,
    subscribers: Arc<AtomicUsize>,
    next_id: AtomicU64,
    client_buffer: usize,
    cancel: CancelToken,
    // subscriber channels left open by a stopped loop; dropped with the hub
    _parked: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("subscribers", &self.subscribers())
            .field("queued", &self.shared.broadcasts.len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    /// Starts the control loop bound to `cancel`.
    pub fn new(cancel: &CancelToken, config: HubConfig) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(0);
        let (bc_tx, bc_rx) = crossbeam_channel::bounded(config.broadcast_buffer);
        let subscribers = Arc::new(AtomicUsize::new(0));
        let parked = Arc::new(Mutex::new(Vec::new()));

        let control = Control {
            cancel: cancel.signal().clone(),
            commands: cmd_rx,
            broadcasts: bc_rx,
            clients: HashMap::new(),
            subscribers: Arc::clone(&subscribers),
            parked: Arc::clone(&parked),
        };
        thread::spawn(move || control.run());

        debug!(
            broadcast_buffer = config.broadcast_buffer,
            client_buffer = config.client_buffer,
            "hub started"
        );

        Self {
            shared: Arc::new(Shared {
                commands: cmd_tx,
                broadcasts: bc_tx,
                subscribers,
                next_id: AtomicU64::new(0),
                client_buffer: config.client_buffer,
                cancel: cancel.clone(),
                _parked: parked,
            }),
        }
    }
}

impl<T> Hub<T> {
    /// Adds a new subscriber and returns its receiving end.
    ///
    /// Returns once the loop has inserted the client. On a stopped hub the
    /// returned client is already closed.
    pub fn register(&self) -> Client<T> {
        let id = ClientId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = crossbeam_channel::bounded(self.shared.client_buffer);
        let (ack, done) = crossbeam_channel::bounded(1);

        let refused = self.is_stopped()
            || self.shared.commands.send(Command::Register { id, tx, ack }).is_err();
        if refused {
            debug!(%id, "hub stopped; returning closed client");
        } else {
            let _ = done.recv();
        }

        Client { id, rx }
    }

    /// Removes `client` from the subscriber set and closes its channel.
    pub fn unregister(&self, client: &Client<T>) {
        self.unregister_id(client.id);
    }

    /// Drops the client's receiving end, then unregisters it.
    ///
    /// Releasing the receiver first means a loop blocked on delivering to this
    /// client gets unstuck, so this never deadlocks against the loop.
    pub fn release(&self, client: Client<T>) {
        let Client { id, rx } = client;
        drop(rx);
        self.unregister_id(id);
    }

    fn unregister_id(&self, id: ClientId) {
        if self.is_stopped() {
            return;
        }
        let (ack, done) = crossbeam_channel::bounded(1);
        if self.shared.commands.send(Command::Unregister { id, ack }).is_ok() {
            let _ = done.recv();
        }
    }

    /// Queues `value` for delivery to every current subscriber.
    ///
    /// Skipped when nobody is subscribed. The count is the loop's last
    /// published figure, so a client registering concurrently may miss the
    /// value; that check is best effort.
    pub fn broadcast(&self, value: T) {
        if self.subscribers() == 0 || self.is_stopped() {
            return;
        }
        if self.shared.broadcasts.send(value).is_err() {
            debug!("hub stopped; broadcast dropped");
        }
    }

    /// `true` once the cancellation signal has fired.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Subscriber count as of the loop's last command.
    #[inline]
    pub fn subscribers(&self) -> usize {
        self.shared.subscribers.load(Ordering::Acquire)
    }
}

/// State owned by the control loop thread.
struct Control<T> {
    cancel: Receiver<()>,
    commands: Receiver<Command<T>>,
    broadcasts: Receiver<T>,
    clients: HashMap<ClientId, Sender<T>>,
    subscribers: Arc<AtomicUsize>,
    parked: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T: Clone> Control<T> {
    fn run(mut self) {
        loop {
            select! {
                recv(self.cancel) -> _ => break,
                recv(self.commands) -> cmd => match cmd {
                    Ok(cmd) => self.apply(cmd),
                    Err(_) => break,
                },
                recv(self.broadcasts) -> value => match value {
                    Ok(value) => self.deliver(value),
                    Err(_) => break,
                },
            }
            self.subscribers.store(self.clients.len(), Ordering::Release);
        }

        let open = self.clients.len();
        self.parked.lock().extend(self.clients.drain().map(|(_, tx)| tx));
        debug!(open, "hub stopped");
    }

    fn apply(&mut self, cmd: Command<T>) {
        match cmd {
            Command::Register { id, tx, ack } => {
                self.clients.insert(id, tx);
                self.publish_count();
                trace!(%id, subscribers = self.clients.len(), "client registered");
                let _ = ack.send(());
            }
            Command::Unregister { id, ack } => {
                // dropping the sender closes the client's channel
                if self.clients.remove(&id).is_some() {
                    trace!(%id, subscribers = self.clients.len(), "client unregistered");
                }
                self.publish_count();
                let _ = ack.send(());
            }
        }
    }

    fn deliver(&mut self, value: T) {
        self.clients.retain(|id, tx| match tx.send(value.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(%id, "client receiver gone; dropping subscriber");
                false
            }
        });
    }

    #[inline]
    fn publish_count(&self) {
        self.subscribers.store(self.clients.len(), Ordering::Release);
    }
}
