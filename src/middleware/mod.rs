// Middleware for resilient upstream calls
//
// Every external service is wrapped in a circuit breaker so a dead upstream
// fails fast instead of stalling each request until its timeout.

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerOpen, CircuitBreaker, CircuitBreakerConfig, CircuitState, UpstreamFault};
