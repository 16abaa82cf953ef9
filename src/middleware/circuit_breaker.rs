use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::errors::{CurrencyError, RecognitionError, SpeechError, TranslationError};
use crate::utils::Metrics;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through
    Closed,
    /// Upstream considered down, requests fail fast
    Open,
    /// One probe request is allowed through to test recovery
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive upstream faults before the circuit opens
    pub failure_threshold: usize,
    /// How long the circuit stays open before a probe is allowed
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Returned by [`CircuitBreaker::guard`] while the circuit refuses requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOpen;

/// Errors that can tell whether they indicate an upstream fault.
///
/// Validation failures (empty text, missing fields) never count against the upstream.
pub trait UpstreamFault {
    fn is_upstream_fault(&self) -> bool;
    fn circuit_open() -> Self;
}

/// Fail-fast guard around one upstream service.
///
/// Opens after `failure_threshold` consecutive upstream faults, and after
/// `open_timeout` lets exactly one probe through. The probe's outcome closes or
/// re-opens the circuit. Requests are never retried here.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    inner: Arc<Mutex<BreakerInner>>,
    config: CircuitBreakerConfig,
    metrics: Option<Metrics>,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig, metrics: Option<Metrics>) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            })),
            config,
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Admit or refuse one request. `Ok(true)` means the request is the half-open probe.
    pub fn guard(&self) -> Result<bool, BreakerOpen> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.open_timeout)
                    .unwrap_or(true);
                if elapsed {
                    debug!(breaker = self.name, "Open timeout elapsed, sending probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Ok(true)
                } else {
                    Err(BreakerOpen)
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(BreakerOpen)
                } else {
                    inner.probe_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;

        if inner.state != CircuitState::Closed {
            info!(breaker = self.name, "Upstream recovered, closing circuit");
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.probe_in_flight = false;

        let should_open = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            warn!(
                breaker = self.name,
                failures = inner.consecutive_failures,
                "Opening circuit for {:?}",
                self.config.open_timeout
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            if let Some(ref m) = self.metrics {
                m.record_circuit_breaker_trip(self.name);
            }
        }
    }

    /// Counts a non-fault completion without touching the failure streak
    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
    }

    /// Run `call` if the circuit admits it, recording the outcome.
    ///
    /// If the future is dropped before completing (client went away), the half-open
    /// slot it held is handed back so the next request can try the upstream instead.
    pub async fn run<T, E, Fut>(&self, call: Fut) -> Result<T, E>
    where
        E: UpstreamFault,
        Fut: Future<Output = Result<T, E>>,
    {
        let half_open = match self.guard() {
            Ok(half_open) => half_open,
            Err(BreakerOpen) => return Err(E::circuit_open()),
        };

        let mut trial = TrialSlot {
            breaker: self,
            held: half_open,
        };
        let result = call.await;
        trial.held = false;

        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.is_upstream_fault() => self.record_failure(),
            Err(_) => self.release_probe(),
        }
        result
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

/// Releases an unfinished half-open trial when a `run` future is dropped mid-call
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            debug!(breaker = self.breaker.name, "Half-open call abandoned, releasing slot");
            self.breaker.release_probe();
        }
    }
}

impl UpstreamFault for TranslationError {
    fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            TranslationError::RequestFailed(_)
                | TranslationError::Upstream { .. }
                | TranslationError::InvalidResponse(_)
        )
    }

    fn circuit_open() -> Self {
        TranslationError::CircuitOpen
    }
}

impl UpstreamFault for SpeechError {
    fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            SpeechError::RequestFailed(_) | SpeechError::Upstream { .. } | SpeechError::EmptyAudio
        )
    }

    fn circuit_open() -> Self {
        SpeechError::CircuitOpen
    }
}

impl UpstreamFault for CurrencyError {
    fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            CurrencyError::RequestFailed(_) | CurrencyError::Upstream { .. }
        )
    }

    fn circuit_open() -> Self {
        CurrencyError::CircuitOpen
    }
}

impl UpstreamFault for RecognitionError {
    fn is_upstream_fault(&self) -> bool {
        // A bad image is the caller's problem, not the engine's
        matches!(
            self,
            RecognitionError::EngineUnavailable { .. }
                | RecognitionError::EngineFailed { .. }
                | RecognitionError::Timeout(_)
        )
    }

    fn circuit_open() -> Self {
        RecognitionError::CircuitOpen
    }
}
