/// Classification for retry policy.
///
/// Used to determine how the resilience guard should respond to errors
/// from a quote provider.
///
/// # Behavior Summary
///
/// | Class | Retry? | Record Circuit Breaker Failure? |
/// |-------|--------|--------------------------------|
/// | `Never` | No | Depends on the error (see `is_provider_failure`) |
/// | `WithBackoff` | Yes | Only once retries are exhausted |
/// | `CircuitOpen` | No | No (the provider was never called) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, bad credentials, or an unparseable response.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Retry with exponential backoff and jitter.
    ///
    /// Used for transient errors like rate limiting (429), server errors (5xx),
    /// timeouts, and connection failures. If all attempts fail, the call
    /// resolves to `RetriesExhausted`, which counts as a single failure
    /// against the circuit breaker.
    WithBackoff,

    /// The circuit breaker is open.
    /// The provider was never called; wait for the cooldown to elapse.
    CircuitOpen,
}
