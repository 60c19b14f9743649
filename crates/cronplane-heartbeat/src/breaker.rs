use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use cronplane_core::{Error, Result};

/// Per-call timeout applied to every guarded call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(6);
const FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { until: Instant },
}

/// A simple closed/open circuit breaker keyed by logical action name
/// ("report-run", "create-monitor", ...). Three consecutive failures open
/// the circuit for a cooldown; any success closes it again. While open,
/// calls are rejected without touching the wire.
pub struct CircuitBreaker {
    states: Mutex<HashMap<String, BreakerState>>,
    call_timeout: Duration,
    failure_threshold: u32,
    cooldown: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CALL_TIMEOUT, FAILURE_THRESHOLD, COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(call_timeout: Duration, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            call_timeout,
            failure_threshold,
            cooldown,
        }
    }

    /// Run `fut` under the breaker for `action`.
    pub async fn call<T, F>(&self, action: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(rejection) = self.check_open(action) {
            return Err(rejection);
        }

        let outcome = match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::UpstreamTimeout(format!(
                "{action}: no response within {:?}",
                self.call_timeout
            ))),
        };

        match &outcome {
            Ok(_) => self.record_success(action),
            Err(e) => self.record_failure(action, e),
        }
        outcome
    }

    fn check_open(&self, action: &str) -> Option<Error> {
        let mut states = self.states.lock().unwrap();
        match states.get(action) {
            Some(BreakerState::Open { until }) if Instant::now() < *until => Some(
                Error::UpstreamTimeout(format!("{action}: circuit open, backing off")),
            ),
            Some(BreakerState::Open { .. }) => {
                // Cooldown elapsed: allow one probe call through.
                states.insert(action.to_string(), BreakerState::Closed { failures: 0 });
                None
            }
            _ => None,
        }
    }

    fn record_success(&self, action: &str) {
        self.states
            .lock()
            .unwrap()
            .insert(action.to_string(), BreakerState::Closed { failures: 0 });
    }

    fn record_failure(&self, action: &str, error: &Error) {
        let mut states = self.states.lock().unwrap();
        let failures = match states.get(action) {
            Some(BreakerState::Closed { failures }) => failures + 1,
            _ => 1,
        };
        if failures >= self.failure_threshold {
            warn!(action = %action, error = %error, "circuit opened");
            states.insert(
                action.to_string(),
                BreakerState::Open {
                    until: Instant::now() + self.cooldown,
                },
            );
        } else {
            states.insert(action.to_string(), BreakerState::Closed { failures });
        }
    }
}
