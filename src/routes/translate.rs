use actix_web::{post, web, HttpResponse};
use serde::Deserialize;

use crate::middleware::AuthUser;
use crate::services::translation_service::TranslationService;

// DTO de traduction (from = "auto" si omis)
#[derive(Deserialize)]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
}

/// POST /api/translate - Proxy de traduction
/// Précédence statique des providers: Azure Translator puis LLM;
/// aucune credential configurée → erreur explicite
#[post("/translate")]
pub async fn translate(
    _auth_user: AuthUser,
    body: web::Json<TranslateRequest>,
    translation_service: web::Data<TranslationService>,
) -> HttpResponse {
    // 1. Champs requis
    let text = match body.text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => text,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'text' is required"
            }));
        }
    };
    let to = match body.to.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(to) => to,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'to' is required"
            }));
        }
    };
    let from = body.from.as_deref().unwrap_or("auto");

    // 2. Déléguer à l'adapter (le message du provider est transmis tel quel)
    match translation_service.translate(text, to, from).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) if e.contains("No translation provider configured") => {
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": e
            }))
        }
        Err(e) => HttpResponse::BadGateway().json(serde_json::json!({
            "error": e
        })),
    }
}

pub fn translate_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(translate);
}
