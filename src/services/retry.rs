use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 250;

/// Réessaie un appel upstream avec backoff exponentiel (250ms, 500ms).
/// Réservé aux appels idempotents (verify paiement, status vidéo, traduction):
/// les créations côté provider ne passent JAMAIS par ici.
pub async fn with_backoff<T, F, Fut>(label: &str, mut operation: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = e;
                if attempt < MAX_ATTEMPTS {
                    let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    eprintln!(
                        "⚠️  {} failed (attempt {}/{}): {}, retrying in {}ms",
                        label, attempt, MAX_ATTEMPTS, last_error, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = with_backoff("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<i32, String> = with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
