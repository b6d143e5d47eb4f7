use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use serde::Deserialize;
use rust_decimal::Decimal;

use crate::models::purchase_history::{Entity as PurchaseHistory, Column as PurchaseColumn, ActiveModel as PurchaseActiveModel};
use crate::middleware::AuthUser;

pub const VALID_PAYMENT_STATUSES: [&str; 3] = ["paid", "pending", "failed"];

// DTO pour enregistrer une tentative d'achat
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPurchaseRequest {
    pub student_id: i32,
    pub course_id: i32,
    pub payment_status: String, // 'paid', 'pending', 'failed'
    pub transaction_date: Option<chrono::DateTime<chrono::Utc>>,
    pub amount: Option<Decimal>,
    pub tx_ref: Option<String>,
}

/// Valide le statut de paiement contre la liste autorisée
pub fn is_valid_payment_status(status: &str) -> bool {
    VALID_PAYMENT_STATUSES.contains(&status)
}

/// POST /api/purchase-history - Enregistrer une tentative d'achat
///
/// Journal append-only: le document est inséré tel quel, aucune règle métier
/// au-delà des champs requis et de l'enum de statut. Une nouvelle tentative
/// produit toujours un nouvel enregistrement.
#[post("")]
pub async fn record_purchase(
    _auth_user: AuthUser,
    body: web::Json<RecordPurchaseRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // Valider le statut
    if !is_valid_payment_status(&body.payment_status) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid paymentStatus. Must be one of: paid, pending, failed"
        }));
    }

    let new_purchase = PurchaseActiveModel {
        student_id: Set(body.student_id),
        course_id: Set(body.course_id),
        payment_status: Set(body.payment_status.clone()),
        transaction_date: Set(body.transaction_date.unwrap_or_else(chrono::Utc::now)),
        amount: Set(body.amount),
        tx_ref: Set(body.tx_ref.clone()),
        ..Default::default()
    };

    match new_purchase.insert(db.get_ref()).await {
        Ok(purchase) => HttpResponse::Created().json(purchase),
        Err(e) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to record purchase: {}", e)
        })),
    }
}

/// GET /api/purchase-history/{student_id} - Historique d'un étudiant
///
/// Retourne tous les enregistrements dans l'ordre de stockage (aucun tri
/// garanti: le client trie lui-même s'il veut du chronologique).
#[get("/{student_id}")]
pub async fn list_purchases(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let student_id = path.into_inner();

    let purchases = PurchaseHistory::find()
        .filter(PurchaseColumn::StudentId.eq(student_id))
        .all(db.get_ref())
        .await;

    match purchases {
        Ok(purchases) => HttpResponse::Ok().json(purchases),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch purchase history: {}", e)
        })),
    }
}

pub fn purchase_history_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/purchase-history")
            .service(record_purchase)
            .service(list_purchases)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_statuses_accepted() {
        assert!(is_valid_payment_status("paid"));
        assert!(is_valid_payment_status("pending"));
        assert!(is_valid_payment_status("failed"));
    }

    #[test]
    fn test_invalid_statuses_rejected() {
        assert!(!is_valid_payment_status("refunded"));
        assert!(!is_valid_payment_status("PAID"));
        assert!(!is_valid_payment_status(""));
    }
}
