//! Circuit breaker registry for AI worker operations
//!
//! One independent breaker per operation key (`forwardAudio`,
//! `processModeration`, `healthCheck`, or any other key a caller uses).
//! Breakers are created lazily and live for the process.
//!
//! States:
//! - Closed: calls execute; outcomes feed the rolling window
//! - Open: calls are rejected without running the thunk
//! - Half-Open: a single trial call decides between Closed and Open
//!
//! The reset timeout is a timestamp comparison made when a call arrives;
//! there are no timers.

mod listener;
mod state;
mod window;


pub use listener::{BroadcastListener, CircuitEventListener};
pub use state::{CircuitMetricsSnapshot, LifetimeCounters};
pub use window::WindowCounts;

use guardian_types::{BreakerSettings, CircuitEvent, CircuitState, RelayError};
use parking_lot::{Mutex, RwLock};
use state::OperationCircuit;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::prometheus;

/// Handle returned by [`CircuitBreakerRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Manages circuit breakers for all operation keys
pub struct CircuitBreakerRegistry {
    settings: BreakerSettings,
    circuits: RwLock<HashMap<String, Arc<Mutex<OperationCircuit>>>>,
    history: Mutex<VecDeque<CircuitEvent>>,
    total_transitions: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn CircuitEventListener>)>>,
    next_listener_id: AtomicU64,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("settings", &self.settings)
            .field("circuits", &self.circuits.read().len())
            .field("total_transitions", &self.total_transitions())
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial { epoch: u64 },
}

/// Admission ticket for one call. Dropping an unfinished trial frees the slot.
struct CallPermit<'a> {
    registry: &'a CircuitBreakerRegistry,
    operation: &'a str,
    circuit: Arc<Mutex<OperationCircuit>>,
    admission: Admission,
    completed: bool,
}

impl CallPermit<'_> {
    fn complete(mut self, failure: Option<&RelayError>, elapsed: Duration) {
        self.completed = true;
        self.registry.record_outcome(
            self.operation,
            &self.circuit,
            self.admission,
            failure,
            elapsed,
        );
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Admission::Trial { epoch } = self.admission {
            let mut circuit = self.circuit.lock();
            if circuit.epoch == epoch && circuit.state == CircuitState::HalfOpen {
                circuit.trial_in_flight = false;
                debug!(operation = %self.operation, "Trial call cancelled, releasing half-open slot");
            }
        }
    }
}

impl CircuitBreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        for operation in guardian_types::operations::ALL {
            prometheus::record_breaker_state(operation, CircuitState::Closed);
        }
        Self {
            settings,
            circuits: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            total_transitions: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Run `call` under the breaker for `operation`.
    ///
    /// While the circuit is OPEN (or a half-open trial is in flight) this
    /// returns [`RelayError::CircuitOpen`] without invoking `call`.
    pub async fn execute_call<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        if !self.settings.enable_circuit_breaker {
            let started = Instant::now();
            let result = call().await;
            self.record_passthrough(operation, result.as_ref().err(), started.elapsed());
            return result;
        }

        let permit = self.admit(operation)?;
        let started = Instant::now();
        let result = call().await;
        permit.complete(result.as_ref().err(), started.elapsed());
        result
    }

    fn circuit(&self, operation: &str) -> Arc<Mutex<OperationCircuit>> {
        if let Some(circuit) = self.circuits.read().get(operation) {
            return Arc::clone(circuit);
        }
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(operation.to_string()).or_insert_with(|| {
            let config = self.settings.config_for(operation).clone();
            let window = Duration::from_millis(self.settings.metrics_window_size_ms);
            Arc::new(Mutex::new(OperationCircuit::new(config, window)))
        });
        Arc::clone(circuit)
    }

    fn admit<'a>(&'a self, operation: &'a str) -> Result<CallPermit<'a>, RelayError> {
        let circuit = self.circuit(operation);
        let now = Instant::now();
        let mut event = None;

        let decision = {
            let mut c = circuit.lock();
            if c.state == CircuitState::Open && c.remaining_open(now).is_zero() {
                c.half_open();
                event = Some(Self::transition(
                    &mut c,
                    operation,
                    CircuitState::Open,
                    "reset timeout elapsed, admitting trial call".to_string(),
                ));
            }

            match c.state {
                CircuitState::Closed => Ok(Admission::Normal),
                CircuitState::HalfOpen if !c.trial_in_flight => {
                    c.trial_in_flight = true;
                    Ok(Admission::Trial { epoch: c.epoch })
                },
                CircuitState::Open | CircuitState::HalfOpen => {
                    c.lifetime.rejected_calls += 1;
                    Err(RelayError::CircuitOpen {
                        operation: operation.to_string(),
                        retry_after_ms: c.remaining_open(now).as_millis() as u64,
                    })
                },
            }
        };

        if let Some(event) = event {
            self.publish(event);
        }

        match decision {
            Ok(admission) => {
                Ok(CallPermit { registry: self, operation, circuit, admission, completed: false })
            },
            Err(err) => {
                debug!(operation = %operation, "Circuit open, rejecting call");
                prometheus::record_breaker_rejection(operation);
                Err(err)
            },
        }
    }

    fn record_outcome(
        &self,
        operation: &str,
        circuit: &Mutex<OperationCircuit>,
        admission: Admission,
        failure: Option<&RelayError>,
        elapsed: Duration,
    ) {
        let now = Instant::now();
        let event = {
            let mut c = circuit.lock();
            let slow = elapsed >= c.slow_threshold();
            c.lifetime.total_requests += 1;
            c.lifetime.slow_calls += u64::from(slow);
            c.window.record(now, failure.is_some(), slow);

            let is_live_trial = matches!(
                admission,
                Admission::Trial { epoch } if epoch == c.epoch && c.state == CircuitState::HalfOpen
            );

            if let Some(err) = failure {
                c.lifetime.failures += 1;
                c.consecutive_failures += 1;
                c.last_failure_reason = Some(err.to_string());
            } else {
                c.consecutive_failures = 0;
            }

            if is_live_trial {
                let previous = c.state;
                if let Some(err) = failure {
                    c.open(now);
                    Some(Self::transition(&mut c, operation, previous, format!("trial call failed: {err}")))
                } else {
                    c.close();
                    Some(Self::transition(&mut c, operation, previous, "trial call succeeded".to_string()))
                }
            } else if c.state == CircuitState::Closed {
                c.trip_reason(now).map(|reason| {
                    c.open(now);
                    Self::transition(&mut c, operation, CircuitState::Closed, reason)
                })
            } else {
                None
            }
        };

        prometheus::record_breaker_call(operation, failure.is_none(), elapsed);
        if let Some(event) = event {
            self.publish(event);
        }
    }

    fn record_passthrough(&self, operation: &str, failure: Option<&RelayError>, elapsed: Duration) {
        let circuit = self.circuit(operation);
        {
            let mut c = circuit.lock();
            let slow = elapsed >= c.slow_threshold();
            c.lifetime.total_requests += 1;
            c.lifetime.slow_calls += u64::from(slow);
            c.window.record(Instant::now(), failure.is_some(), slow);
            if let Some(err) = failure {
                c.lifetime.failures += 1;
                c.last_failure_reason = Some(err.to_string());
            }
        }
        prometheus::record_breaker_call(operation, failure.is_none(), elapsed);
    }

    /// Book-keeping for a state change already applied to `circuit`.
    fn transition(
        circuit: &mut OperationCircuit,
        operation: &str,
        previous: CircuitState,
        reason: String,
    ) -> CircuitEvent {
        let next = circuit.state;
        circuit.lifetime.transitions += 1;
        if next == CircuitState::Open {
            warn!(
                operation = %operation,
                from = %previous,
                to = %next,
                consecutive_failures = circuit.consecutive_failures,
                reason = %reason,
                "Circuit breaker opening"
            );
        } else {
            info!(operation = %operation, from = %previous, to = %next, reason = %reason, "Circuit breaker state change");
        }
        CircuitEvent::state_change(operation, previous, next, reason)
    }

    fn publish(&self, event: CircuitEvent) {
        self.total_transitions.fetch_add(1, Ordering::Relaxed);
        prometheus::record_breaker_transition(&event);

        {
            let mut history = self.history.lock();
            history.push_back(event.clone());
            while history.len() > self.settings.max_events_in_history {
                history.pop_front();
            }
        }

        let listeners: Vec<Arc<dyn CircuitEventListener>> =
            self.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    pub fn get_state(&self, operation: &str) -> CircuitState {
        let circuit = self.circuits.read().get(operation).map(Arc::clone);
        circuit.map_or(CircuitState::Closed, |c| c.lock().state)
    }

    pub fn get_metrics(&self, operation: &str) -> CircuitMetricsSnapshot {
        self.circuit(operation).lock().snapshot(operation, Instant::now())
    }

    /// Snapshots for every breaker created so far, sorted by key.
    pub fn get_all_metrics(&self) -> Vec<CircuitMetricsSnapshot> {
        let mut circuits: Vec<(String, Arc<Mutex<OperationCircuit>>)> = self
            .circuits
            .read()
            .iter()
            .map(|(k, c)| (k.clone(), Arc::clone(c)))
            .collect();
        circuits.sort_by(|a, b| a.0.cmp(&b.0));
        let now = Instant::now();
        circuits.into_iter().map(|(key, c)| c.lock().snapshot(&key, now)).collect()
    }

    pub fn operations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.circuits.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Transition log, oldest first.
    pub fn get_event_history(&self) -> Vec<CircuitEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// The `limit` most recent transitions, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<CircuitEvent> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn total_transitions(&self) -> u64 {
        self.total_transitions.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self, listener: Arc<dyn CircuitEventListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Force a circuit OPEN. Returns false when it already was.
    pub fn force_trip(&self, operation: &str, reason: &str) -> bool {
        let circuit = self.circuit(operation);
        let event = {
            let mut c = circuit.lock();
            if c.state == CircuitState::Open {
                return false;
            }
            let previous = c.state;
            c.open(Instant::now());
            Self::transition(&mut c, operation, previous, format!("forced: {reason}"))
        };
        self.publish(event);
        true
    }

    /// Force a circuit CLOSED and clear its window. Returns false when it already was.
    pub fn force_reset(&self, operation: &str, reason: &str) -> bool {
        let circuit = self.circuit(operation);
        let event = {
            let mut c = circuit.lock();
            if c.state == CircuitState::Closed {
                return false;
            }
            let previous = c.state;
            c.close();
            Self::transition(&mut c, operation, previous, format!("forced: {reason}"))
        };
        self.publish(event);
        true
    }
}
