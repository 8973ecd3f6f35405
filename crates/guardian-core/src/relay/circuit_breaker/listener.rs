//! Transition subscribers.

use guardian_types::CircuitEvent;
use tokio::sync::broadcast;

/// Receives every breaker transition, synchronously, after the per-key lock
/// is released. Implementations must not block.
pub trait CircuitEventListener: Send + Sync {
    fn on_event(&self, event: &CircuitEvent);
}

impl<F> CircuitEventListener for F
where
    F: Fn(&CircuitEvent) + Send + Sync,
{
    fn on_event(&self, event: &CircuitEvent) {
        self(event);
    }
}

/// Fans transitions out to any number of async receivers.
///
/// Lagging receivers lose the oldest events; the breaker is never blocked.
#[derive(Debug, Clone)]
pub struct BroadcastListener {
    tx: broadcast::Sender<CircuitEvent>,
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CircuitEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl CircuitEventListener for BroadcastListener {
    fn on_event(&self, event: &CircuitEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event.clone());
    }
}
