use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Breaker type shared by outbound Clay calls. Cloning shares the state.
pub type OutboundBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for outbound webhook calls to prevent piling
/// requests onto an unreachable Clay endpoint.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if the endpoint recovered.
pub fn create_outbound_circuit_breaker() -> OutboundBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::futures::CircuitBreaker;
    use failsafe::Error;

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let cb = create_outbound_circuit_breaker();

        for _ in 0..5 {
            let result = cb.call(async { Err::<(), &str>("webhook down") }).await;
            assert!(result.is_err());
        }

        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        match result {
            Err(Error::Rejected) => {}
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_allows_success() {
        let cb = create_outbound_circuit_breaker();

        let result = cb.call(async { Ok::<i32, &str>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cb = create_outbound_circuit_breaker();
        let other = cb.clone();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<(), &str>("webhook down") }).await;
        }

        let result = other.call(async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(Error::Rejected)));
    }
}
