use serde::Serialize;
use serde_json::Value;
use std::env;

use crate::services::retry;

/// Prompt fixe du fallback LLM: la traduction est contrainte à la paire
/// amharique ↔ anglais, rien d'autre
const LLM_SYSTEM_PROMPT: &str = "You are a translation engine. Translate the user's text \
between Amharic and English only: if the text is in Amharic, translate it to English; \
if it is in English, translate it to Amharic. Reply with the translation only, \
no explanations.";

/// Adapter de traduction: précédence statique Azure Translator → LLM.
/// Aucune credential n'est requise au démarrage; l'absence des deux
/// jeux de credentials est une erreur de configuration au moment de l'appel.
#[derive(Clone)]
pub struct TranslationService {
    client: reqwest::Client,
    azure_key: Option<String>,
    azure_region: Option<String>,
    azure_endpoint: String,
    openai_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    Azure,
    OpenAi,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub provider: String,
    pub translated_text: String,
    pub from: String,
    pub to: String,
}

impl TranslationService {
    pub fn from_env() -> Self {
        TranslationService {
            client: reqwest::Client::new(),
            azure_key: env::var("AZURE_TRANSLATOR_KEY").ok(),
            azure_region: env::var("AZURE_TRANSLATOR_REGION").ok(),
            azure_endpoint: env::var("AZURE_TRANSLATOR_ENDPOINT")
                .unwrap_or_else(|_| "https://api.cognitive.microsofttranslator.com".to_string()),
            openai_key: env::var("OPENAI_API_KEY").ok(),
        }
    }

    /// Sélection de provider à précédence statique:
    /// paire Azure (clé + région) d'abord, clé LLM sinon, erreur de
    /// configuration si aucun des deux n'est présent
    pub fn select_provider(&self) -> Result<Provider, String> {
        if self.azure_key.is_some() && self.azure_region.is_some() {
            return Ok(Provider::Azure);
        }
        if self.openai_key.is_some() {
            return Ok(Provider::OpenAi);
        }
        Err("No translation provider configured (set AZURE_TRANSLATOR_KEY + \
             AZURE_TRANSLATOR_REGION, or OPENAI_API_KEY)"
            .to_string())
    }

    /// Traduit `text` vers `to` (source `from`, "auto" par défaut)
    pub async fn translate(
        &self,
        text: &str,
        to: &str,
        from: &str,
    ) -> Result<TranslationResult, String> {
        if text.trim().is_empty() {
            return Err("'text' is required".to_string());
        }
        if to.trim().is_empty() {
            return Err("'to' is required".to_string());
        }

        match self.select_provider()? {
            Provider::Azure => self.translate_azure(text, to, from).await,
            Provider::OpenAi => self.translate_llm(text, to, from).await,
        }
    }

    /// Chemin cloud: POST sur l'endpoint translate avec to/from en query,
    /// premier candidat + langue source détectée extraits de l'enveloppe
    async fn translate_azure(
        &self,
        text: &str,
        to: &str,
        from: &str,
    ) -> Result<TranslationResult, String> {
        let key = self.azure_key.clone().unwrap_or_default();
        let region = self.azure_region.clone().unwrap_or_default();

        let mut url = format!(
            "{}/translate?api-version=3.0&to={}",
            self.azure_endpoint, to
        );
        if from != "auto" && !from.is_empty() {
            url.push_str(&format!("&from={}", from));
        }

        let body = retry::with_backoff("azure translate", || {
            let client = self.client.clone();
            let url = url.clone();
            let key = key.clone();
            let region = region.clone();
            let payload = serde_json::json!([{ "Text": text }]);
            async move {
                let response = client
                    .post(&url)
                    .header("Ocp-Apim-Subscription-Key", &key)
                    .header("Ocp-Apim-Subscription-Region", &region)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| format!("Translator request failed: {}", e))?;

                if !response.status().is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(format!("Translator rejected request: {}", message));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Invalid translator response: {}", e))
            }
        })
        .await?;

        let translated_text = body[0]["translations"][0]["text"]
            .as_str()
            .ok_or_else(|| "Translator response missing translation".to_string())?
            .to_string();

        let detected_from = body[0]["detectedLanguage"]["language"]
            .as_str()
            .unwrap_or(from)
            .to_string();

        Ok(TranslationResult {
            provider: "azure".to_string(),
            translated_text,
            from: detected_from,
            to: to.to_string(),
        })
    }

    /// Chemin LLM: chat completion avec prompt système fixe (amharique ↔ anglais)
    async fn translate_llm(
        &self,
        text: &str,
        to: &str,
        from: &str,
    ) -> Result<TranslationResult, String> {
        let key = self.openai_key.clone().unwrap_or_default();

        let body = retry::with_backoff("llm translate", || {
            let client = self.client.clone();
            let key = key.clone();
            let payload = serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": LLM_SYSTEM_PROMPT },
                    { "role": "user", "content": text }
                ],
                "temperature": 0.2,
            });
            async move {
                let response = client
                    .post("https://api.openai.com/v1/chat/completions")
                    .bearer_auth(&key)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| format!("LLM request failed: {}", e))?;

                if !response.status().is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(format!("LLM rejected request: {}", message));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Invalid LLM response: {}", e))
            }
        })
        .await?;

        let translated_text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| "LLM response missing content".to_string())?
            .trim()
            .to_string();

        Ok(TranslationResult {
            provider: "llm".to_string(),
            translated_text,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(
        azure_key: Option<&str>,
        azure_region: Option<&str>,
        openai_key: Option<&str>,
    ) -> TranslationService {
        TranslationService {
            client: reqwest::Client::new(),
            azure_key: azure_key.map(|s| s.to_string()),
            azure_region: azure_region.map(|s| s.to_string()),
            azure_endpoint: "https://api.cognitive.microsofttranslator.com".to_string(),
            openai_key: openai_key.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_azure_preferred_when_both_configured() {
        let s = service(Some("k"), Some("eastus"), Some("sk-x"));
        assert_eq!(s.select_provider().unwrap(), Provider::Azure);
    }

    #[test]
    fn test_azure_needs_both_key_and_region() {
        // Clé sans région → la paire Azure est incomplète, fallback LLM
        let s = service(Some("k"), None, Some("sk-x"));
        assert_eq!(s.select_provider().unwrap(), Provider::OpenAi);
    }

    #[test]
    fn test_no_provider_is_an_error() {
        let s = service(None, None, None);
        assert!(s.select_provider().is_err());
    }

    #[tokio::test]
    async fn test_missing_text_rejected() {
        let s = service(Some("k"), Some("eastus"), None);
        assert!(s.translate("  ", "en", "auto").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_target_rejected() {
        let s = service(Some("k"), Some("eastus"), None);
        assert!(s.translate("ሰላም", "", "auto").await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_translate_fails_at_call_time() {
        let s = service(None, None, None);
        let err = s.translate("hello", "am", "auto").await.unwrap_err();
        assert!(err.contains("No translation provider configured"));
    }
}
