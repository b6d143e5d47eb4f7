use rust_decimal::Decimal;
use serde_json::Value;
use std::env;

use crate::services::retry;

/// Adapter pour le gateway de paiement hébergé (checkout Chapa).
/// Injecté via web::Data, comme les autres adapters.
#[derive(Clone)]
pub struct PaymentService {
    client: reqwest::Client,
    secret_key: Option<String>,
    base_url: String,
}

impl PaymentService {
    pub fn from_env() -> Self {
        PaymentService {
            client: reqwest::Client::new(),
            secret_key: env::var("CHAPA_SECRET_KEY").ok(),
            base_url: env::var("CHAPA_BASE_URL")
                .unwrap_or_else(|_| "https://api.chapa.co/v1".to_string()),
        }
    }

    fn secret_key(&self) -> Result<&str, String> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| "CHAPA_SECRET_KEY is not configured".to_string())
    }

    /// Initialise une transaction et retourne l'URL de checkout hébergée.
    /// Le tx_ref généré côté serveur sert de clé d'idempotence: rejouer
    /// l'initialisation avec le même tx_ref ne crée pas de double transaction.
    pub async fn initialize(
        &self,
        tx_ref: &str,
        amount: Decimal,
        email: &str,
        full_name: &str,
    ) -> Result<String, String> {
        let secret_key = self.secret_key()?;
        let (first_name, last_name) = split_full_name(full_name);

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(secret_key)
            .json(&serde_json::json!({
                "amount": amount.to_string(),
                "currency": "ETB",
                "email": email,
                "first_name": first_name,
                "last_name": last_name,
                "tx_ref": tx_ref,
            }))
            .send()
            .await
            .map_err(|e| format!("Payment gateway request failed: {}", e))?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(format!("Payment gateway rejected initialization: {}", message));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Invalid payment gateway response: {}", e))?;

        body["data"]["checkout_url"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "Payment gateway response missing checkout_url".to_string())
    }

    /// Vérifie l'issue d'une transaction par sa référence.
    /// Idempotent et sans effet de bord → retry avec backoff.
    pub async fn verify(&self, tx_ref: &str) -> Result<VerifyOutcome, String> {
        let secret_key = self.secret_key()?.to_string();
        let url = format!("{}/transaction/verify/{}", self.base_url, tx_ref);

        let body = retry::with_backoff("payment verify", || {
            let client = self.client.clone();
            let url = url.clone();
            let secret_key = secret_key.clone();
            async move {
                let response = client
                    .get(&url)
                    .bearer_auth(&secret_key)
                    .send()
                    .await
                    .map_err(|e| format!("Payment verify request failed: {}", e))?;

                if !response.status().is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(format!("Payment verify rejected: {}", message));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Invalid payment verify response: {}", e))
            }
        })
        .await?;

        Ok(parse_verify_outcome(&body))
    }
}

/// Issue d'une vérification gateway, vue du state machine local
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifyOutcome {
    Paid,
    Pending,
    Failed,
}

fn parse_verify_outcome(body: &Value) -> VerifyOutcome {
    let envelope_ok = body["status"].as_str() == Some("success");
    match body["data"]["status"].as_str() {
        Some("success") if envelope_ok => VerifyOutcome::Paid,
        Some("failed") | Some("cancelled") => VerifyOutcome::Failed,
        _ => VerifyOutcome::Pending,
    }
}

/// Le gateway attend first_name/last_name séparés
fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.trim().splitn(2, ' ');
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.next().unwrap_or("").to_string();
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_name() {
        assert_eq!(
            split_full_name("Abebe Kebede"),
            ("Abebe".to_string(), "Kebede".to_string())
        );
        assert_eq!(
            split_full_name("Madonna"),
            ("Madonna".to_string(), "".to_string())
        );
        assert_eq!(
            split_full_name("  Anna Maria Jopek"),
            ("Anna".to_string(), "Maria Jopek".to_string())
        );
    }

    #[test]
    fn test_verify_outcome_parsing() {
        use serde_json::json;

        let paid = json!({"status": "success", "data": {"status": "success"}});
        assert_eq!(parse_verify_outcome(&paid), VerifyOutcome::Paid);

        let failed = json!({"status": "success", "data": {"status": "failed"}});
        assert_eq!(parse_verify_outcome(&failed), VerifyOutcome::Failed);

        let pending = json!({"status": "success", "data": {"status": "pending"}});
        assert_eq!(parse_verify_outcome(&pending), VerifyOutcome::Pending);

        // Enveloppe en échec sans statut de transaction → toujours pending
        let unknown = json!({"status": "error"});
        assert_eq!(parse_verify_outcome(&unknown), VerifyOutcome::Pending);
    }

    #[tokio::test]
    async fn test_missing_secret_key_fails_at_call_time() {
        let service = PaymentService {
            client: reqwest::Client::new(),
            secret_key: None,
            base_url: "https://api.chapa.co/v1".to_string(),
        };

        assert!(service.verify("tx-123").await.unwrap_err().contains("CHAPA_SECRET_KEY"));
        assert!(service
            .initialize("tx-123", rust_decimal::Decimal::from(100), "a@b.c", "A B")
            .await
            .is_err());
    }
}
