//! # blotter-bus
//!
//! Fan-out of JSON payloads to many concurrent subscribers. Two independent
//! channels exist: order events (blotter snapshots) and market data (tick
//! batches).
//!
//! Publication never blocks: each subscriber owns an unbounded queue, so a
//! slow consumer delays nobody else. Per-subscriber ordering is FIFO;
//! ordering between subscribers is not guaranteed. Queues grow without
//! bound for a stalled subscriber, which is acceptable because subscribers are
//! short-lived streaming connections. Dead subscribers are reaped
//! opportunistically on the next publish.

use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

/// A single fan-out channel.
pub struct EventChannel {
    senders: Mutex<Vec<Sender<String>>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber. Dropping the returned handle detaches it;
    /// the channel notices on the next publish.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = channel::unbounded();
        self.senders.lock().push(tx);
        Subscriber { rx }
    }

    /// Deliver `payload` to every live subscriber and reap dead ones.
    pub fn publish(&self, payload: &str) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(payload.to_string()).is_ok());
    }

    /// Number of currently registered subscribers (including any whose
    /// disconnect has not been observed yet).
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber's receiving end. Clonable so stream adapters can move it
/// in and out of blocking contexts.
#[derive(Clone)]
pub struct Subscriber {
    rx: Receiver<String>,
}

impl Subscriber {
    /// Block up to `timeout` for the next payload. `None` on timeout;
    /// streaming layers turn that into a keep-alive.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(payload) => Some(payload),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Non-blocking poll.
    pub fn try_recv(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(payload) => Some(payload),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Payloads currently queued.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// The gateway's two channels.
pub struct EventBus {
    /// Blotter snapshots, one JSON array per publish.
    pub orders: EventChannel,
    /// Market-data tick batches.
    pub market_data: EventChannel,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            orders: EventChannel::new(),
            market_data: EventChannel::new(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
