//! Nouvelles tentatives bornées, avec attente exponentielle, pour les appels
//! réseau sortants (service d'analyse, relais SMTP).

use std::{future::Future, time::Duration};

use log::warn;

/// Exécute `operation` jusqu'à `attempts` fois.
///
/// Seules les erreurs pour lesquelles `is_transient` renvoie vrai déclenchent
/// une nouvelle tentative; l'attente double à chaque échec.
pub async fn with_backoff<T, E, F, Fut, P>(
    attempts: u32,
    base_delay: Duration,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!("Attempt {attempt}/{attempts} failed ({e}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let flaky = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("failure {n}"))
            } else {
                Ok(n)
            }
        };
        let result: Result<u32, String> =
            with_backoff(3, Duration::from_millis(1), |_| true, flaky).await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let down = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        };
        let result: Result<(), String> =
            with_backoff(3, Duration::from_millis(1), |_| true, down).await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let rejected = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("rejected".to_string())
        };
        let result: Result<(), String> =
            with_backoff(3, Duration::from_millis(1), |_| false, rejected).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
