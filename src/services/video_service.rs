use serde_json::Value;
use std::env;

use crate::services::retry;

/// Adapter pour le provider d'hébergement/encodage vidéo.
/// Construit une seule fois au démarrage et injecté via web::Data:
/// pas de client global paresseux, et re-créable pour les tests.
#[derive(Clone)]
pub struct VideoService {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// URLs de lecture retournées par le provider une fois la vidéo créée
#[derive(Debug, Clone, Default)]
pub struct VideoAsset {
    pub video_id: String,
    pub hls_url: Option<String>,
    pub mp4_url: Option<String>,
    pub playback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoStatus {
    pub playable: bool,
    pub failed: bool,
}

impl VideoService {
    /// La clé est optionnelle: son absence n'empêche pas le démarrage,
    /// l'erreur de configuration est remontée au moment de l'appel
    pub fn from_env() -> Self {
        VideoService {
            client: reqwest::Client::new(),
            api_key: env::var("VIDEO_API_KEY").ok(),
            base_url: env::var("VIDEO_API_BASE_URL")
                .unwrap_or_else(|_| "https://ws.api.video".to_string()),
        }
    }

    fn api_key(&self) -> Result<&str, String> {
        self.api_key
            .as_deref()
            .ok_or_else(|| "VIDEO_API_KEY is not configured".to_string())
    }

    /// Crée la ressource vidéo distante puis y téléverse le fichier local.
    /// Échoue avant tout appel distant si le fichier local n'existe pas.
    pub async fn create_and_upload(
        &self,
        local_path: &str,
        title: &str,
        is_public: bool,
    ) -> Result<VideoAsset, String> {
        let api_key = self.api_key()?.to_string();

        // 1. Vérifier le fichier local avant de contacter le provider
        if tokio::fs::metadata(local_path).await.is_err() {
            return Err(format!("Local file not found: {}", local_path));
        }

        // 2. Créer la ressource vidéo distante
        let create_response = self
            .client
            .post(format!("{}/videos", self.base_url))
            .bearer_auth(&api_key)
            .json(&serde_json::json!({
                "title": title,
                "public": is_public,
            }))
            .send()
            .await
            .map_err(|e| format!("Video provider request failed: {}", e))?;

        if !create_response.status().is_success() {
            let message = create_response.text().await.unwrap_or_default();
            return Err(format!("Video provider rejected creation: {}", message));
        }

        let created: Value = create_response
            .json()
            .await
            .map_err(|e| format!("Invalid video provider response: {}", e))?;

        let video_id = created["videoId"]
            .as_str()
            .ok_or_else(|| "Video provider response missing videoId".to_string())?
            .to_string();

        // 3. Téléverser le fichier
        let file_bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| format!("Failed to read local file: {}", e))?;

        let file_name = std::path::Path::new(local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(file_bytes).file_name(file_name));

        let upload_response = self
            .client
            .post(format!("{}/videos/{}/source", self.base_url, video_id))
            .bearer_auth(&api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Video upload failed: {}", e))?;

        if !upload_response.status().is_success() {
            let message = upload_response.text().await.unwrap_or_default();
            return Err(format!("Video provider rejected upload: {}", message));
        }

        let uploaded: Value = upload_response
            .json()
            .await
            .map_err(|e| format!("Invalid video provider response: {}", e))?;

        // 4. Extraire les URLs: la réponse d'upload fait foi, sinon la création
        let assets = if uploaded.get("assets").is_some() {
            &uploaded["assets"]
        } else {
            &created["assets"]
        };
        let (hls_url, mp4_url, playback_url) = extract_urls(assets);

        Ok(VideoAsset {
            video_id,
            hls_url,
            mp4_url,
            playback_url,
        })
    }

    /// Interroge le statut d'encodage chez le provider (aucun état local).
    /// Appel idempotent → protégé par retry avec backoff.
    pub async fn get_status(&self, video_id: &str) -> Result<VideoStatus, String> {
        let api_key = self.api_key()?.to_string();
        let url = format!("{}/videos/{}/status", self.base_url, video_id);

        let body = retry::with_backoff("video status", || {
            let client = self.client.clone();
            let url = url.clone();
            let api_key = api_key.clone();
            async move {
                let response = client
                    .get(&url)
                    .bearer_auth(&api_key)
                    .send()
                    .await
                    .map_err(|e| format!("Video status request failed: {}", e))?;

                if !response.status().is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(format!("Video status query rejected: {}", message));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Invalid video status response: {}", e))
            }
        })
        .await?;

        let playable = body["encoding"]["playable"].as_bool().unwrap_or(false);
        let failed = body["encoding"]["status"].as_str() == Some("failed")
            || body["ingest"]["status"].as_str() == Some("failed");

        Ok(VideoStatus { playable, failed })
    }

    /// Récupère la ressource vidéo et ré-extrait ses URLs de lecture
    /// (utile quand les assets n'étaient pas encore prêts à l'upload)
    pub async fn get_video(&self, video_id: &str) -> Result<VideoAsset, String> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/videos/{}", self.base_url, video_id))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| format!("Video fetch request failed: {}", e))?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(format!("Video provider rejected fetch: {}", message));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Invalid video provider response: {}", e))?;

        let (hls_url, mp4_url, playback_url) = extract_urls(&body["assets"]);

        Ok(VideoAsset {
            video_id: video_id.to_string(),
            hls_url,
            mp4_url,
            playback_url,
        })
    }

    /// Supprime la vidéo chez le provider
    pub async fn delete(&self, video_id: &str) -> Result<(), String> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .delete(format!("{}/videos/{}", self.base_url, video_id))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| format!("Video delete request failed: {}", e))?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(format!("Video provider rejected deletion: {}", message));
        }

        Ok(())
    }
}

/// Extrait (hls, mp4, playback) d'une structure "assets" qui peut être un
/// tableau d'assets typés ou un objet à clés hls/mp4. Pour chaque asset,
/// préférer `url`, sinon `playbackUrl`. L'asset HLS est préféré au MP4 pour
/// l'URL de lecture canonique.
pub fn extract_urls(assets: &Value) -> (Option<String>, Option<String>, Option<String>) {
    let mut hls_url: Option<String> = None;
    let mut mp4_url: Option<String> = None;

    let asset_url = |asset: &Value| -> Option<String> {
        asset["url"]
            .as_str()
            .or_else(|| asset["playbackUrl"].as_str())
            .map(|s| s.to_string())
    };

    match assets {
        Value::Array(entries) => {
            for entry in entries {
                match entry["type"].as_str() {
                    Some("hls") => hls_url = asset_url(entry),
                    Some("mp4") => mp4_url = asset_url(entry),
                    _ => {}
                }
            }
        }
        Value::Object(map) => {
            if let Some(hls) = map.get("hls") {
                hls_url = hls.as_str().map(|s| s.to_string()).or_else(|| asset_url(hls));
            }
            if let Some(mp4) = map.get("mp4") {
                mp4_url = mp4.as_str().map(|s| s.to_string()).or_else(|| asset_url(mp4));
            }
        }
        _ => {}
    }

    let playback_url = hls_url.clone().or_else(|| mp4_url.clone());
    (hls_url, mp4_url, playback_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_array_prefers_hls_for_playback() {
        let assets = json!([
            {"type": "mp4", "url": "https://cdn/video.mp4"},
            {"type": "hls", "url": "https://cdn/video.m3u8"}
        ]);

        let (hls, mp4, playback) = extract_urls(&assets);
        assert_eq!(hls.as_deref(), Some("https://cdn/video.m3u8"));
        assert_eq!(mp4.as_deref(), Some("https://cdn/video.mp4"));
        assert_eq!(playback.as_deref(), Some("https://cdn/video.m3u8"));
    }

    #[test]
    fn test_extract_falls_back_to_playback_url_key() {
        let assets = json!([
            {"type": "hls", "playbackUrl": "https://cdn/fallback.m3u8"}
        ]);

        let (hls, _, playback) = extract_urls(&assets);
        assert_eq!(hls.as_deref(), Some("https://cdn/fallback.m3u8"));
        assert_eq!(playback.as_deref(), Some("https://cdn/fallback.m3u8"));
    }

    #[test]
    fn test_extract_prefers_url_over_playback_url() {
        let assets = json!([
            {"type": "hls", "url": "https://cdn/primary.m3u8", "playbackUrl": "https://cdn/secondary.m3u8"}
        ]);

        let (hls, _, _) = extract_urls(&assets);
        assert_eq!(hls.as_deref(), Some("https://cdn/primary.m3u8"));
    }

    #[test]
    fn test_extract_from_object_form() {
        let assets = json!({
            "hls": "https://cdn/object.m3u8",
            "mp4": {"url": "https://cdn/object.mp4"}
        });

        let (hls, mp4, playback) = extract_urls(&assets);
        assert_eq!(hls.as_deref(), Some("https://cdn/object.m3u8"));
        assert_eq!(mp4.as_deref(), Some("https://cdn/object.mp4"));
        assert_eq!(playback.as_deref(), Some("https://cdn/object.m3u8"));
    }

    #[test]
    fn test_extract_mp4_only_becomes_playback() {
        let assets = json!([{"type": "mp4", "url": "https://cdn/only.mp4"}]);

        let (hls, mp4, playback) = extract_urls(&assets);
        assert!(hls.is_none());
        assert_eq!(mp4.as_deref(), Some("https://cdn/only.mp4"));
        assert_eq!(playback.as_deref(), Some("https://cdn/only.mp4"));
    }

    #[test]
    fn test_extract_handles_garbage() {
        let (hls, mp4, playback) = extract_urls(&json!(null));
        assert!(hls.is_none() && mp4.is_none() && playback.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_at_call_time() {
        let service = VideoService {
            client: reqwest::Client::new(),
            api_key: None,
            base_url: "https://ws.api.video".to_string(),
        };

        let result = service.get_status("vi123").await;
        assert!(result.unwrap_err().contains("VIDEO_API_KEY"));
    }
}
