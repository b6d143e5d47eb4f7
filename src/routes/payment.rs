use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    payment_transactions::{self, Entity as PaymentTransactions, Column as TxColumn, ActiveModel as TxActiveModel},
    purchase_history::ActiveModel as PurchaseActiveModel,
    enrollments::{Entity as Enrollments, Column as EnrollmentColumn, ActiveModel as EnrollmentActiveModel},
};
use crate::middleware::AuthUser;
use crate::services::payment_service::{PaymentService, VerifyOutcome};

// DTO pour initier un paiement
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub amount: Decimal,
    pub email: String,
    pub full_name: String,
    pub student_id: i32,
    pub course_id: i32,
}

// Réponse d'initiation: le client ouvre checkoutUrl dans un nouvel onglet
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub checkout_url: String,
    pub tx_ref: String,
}

/// POST /api/payment/initiate - Créer une transaction et obtenir l'URL de checkout
///
/// Le tx_ref est généré ici et enregistré AVANT l'appel gateway: il sert de
/// clé d'idempotence côté provider et de référence pour la vérification.
#[post("/initiate")]
pub async fn initiate_payment(
    _auth_user: AuthUser,
    body: web::Json<InitiatePaymentRequest>,
    db: web::Data<DatabaseConnection>,
    payment_service: web::Data<PaymentService>,
) -> HttpResponse {
    // 1. Valider le payload
    if body.amount <= Decimal::ZERO {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Amount must be greater than 0"
        }));
    }
    if body.email.trim().is_empty() || body.full_name.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "'email' and 'fullName' are required"
        }));
    }

    // 2. Créer la transaction locale en 'pending'
    let tx_ref = format!("tx-{}", Uuid::new_v4());

    let new_tx = TxActiveModel {
        tx_ref: Set(tx_ref.clone()),
        student_id: Set(body.student_id),
        course_id: Set(body.course_id),
        amount: Set(body.amount),
        email: Set(body.email.clone()),
        full_name: Set(body.full_name.clone()),
        status: Set("pending".to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let transaction = match new_tx.insert(db.get_ref()).await {
        Ok(transaction) => transaction,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create transaction: {}", e)
            }));
        }
    };

    // 3. Demander l'URL de checkout au gateway
    let checkout_url = match payment_service
        .initialize(&tx_ref, body.amount, &body.email, &body.full_name)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            // L'initiation a échoué: marquer la transaction tout de suite
            let mut active_model: TxActiveModel = transaction.into();
            active_model.status = Set("failed".to_string());
            if let Err(update_err) = active_model.update(db.get_ref()).await {
                eprintln!("⚠️  Failed to mark transaction {} as failed: {}", tx_ref, update_err);
            }
            return HttpResponse::BadGateway().json(serde_json::json!({
                "error": e
            }));
        }
    };

    HttpResponse::Ok().json(InitiatePaymentResponse {
        checkout_url,
        tx_ref,
    })
}

/// GET /api/payment/verify/{tx_ref} - Vérifier l'issue d'un paiement
///
/// Idempotent: une transaction déjà terminale répond depuis l'état local sans
/// rappeler le gateway. La PREMIÈRE transition pending → paid ajoute
/// l'enregistrement d'historique 'paid' et crée l'inscription; pending →
/// failed ajoute un enregistrement 'failed'. Les appels suivants n'ajoutent
/// rien (l'historique est append-only, un enregistrement par tentative).
#[get("/verify/{tx_ref}")]
pub async fn verify_payment(
    _auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
    payment_service: web::Data<PaymentService>,
) -> HttpResponse {
    let tx_ref = path.into_inner();

    // 1. Retrouver la transaction locale
    let transaction = match PaymentTransactions::find()
        .filter(TxColumn::TxRef.eq(&tx_ref))
        .one(db.get_ref())
        .await
    {
        Ok(Some(transaction)) => transaction,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Unknown transaction reference"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // 2. État terminal: répondre sans rappeler le gateway
    match transaction.status.as_str() {
        "paid" => {
            return HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "status": "paid"
            }));
        }
        "failed" => {
            return HttpResponse::Ok().json(serde_json::json!({
                "success": false,
                "status": "failed"
            }));
        }
        _ => {}
    }

    // 3. Interroger le gateway
    let outcome = match payment_service.verify(&tx_ref).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return HttpResponse::BadGateway().json(serde_json::json!({
                "error": e
            }));
        }
    };

    match outcome {
        VerifyOutcome::Paid => match settle_paid(db.get_ref(), transaction).await {
            Ok(_) => HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "status": "paid"
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to settle payment: {}", e)
            })),
        },
        VerifyOutcome::Failed => match settle_failed(db.get_ref(), transaction).await {
            Ok(_) => HttpResponse::Ok().json(serde_json::json!({
                "success": false,
                "status": "failed"
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to record outcome: {}", e)
            })),
        },
        VerifyOutcome::Pending => HttpResponse::Ok().json(serde_json::json!({
            "success": false,
            "status": "pending"
        })),
    }
}

/// Réclame la transition de statut par un UPDATE conditionnel sur
/// status = 'pending'. Renvoie false si une autre vérification l'a déjà
/// réclamée: les écritures d'historique et d'inscription sont alors
/// sautées, même sous deux verify concurrents du même tx_ref.
async fn claim_pending(
    db: &DatabaseConnection,
    tx_ref: &str,
    next_status: &str,
) -> Result<bool, sea_orm::DbErr> {
    let result = PaymentTransactions::update_many()
        .col_expr(TxColumn::Status, Expr::value(next_status))
        .filter(TxColumn::TxRef.eq(tx_ref))
        .filter(TxColumn::Status.eq("pending"))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

/// Transition pending → paid: statut local, historique 'paid', inscription
async fn settle_paid(
    db: &DatabaseConnection,
    transaction: payment_transactions::Model,
) -> Result<(), sea_orm::DbErr> {
    let student_id = transaction.student_id;
    let course_id = transaction.course_id;
    let amount = transaction.amount;
    let tx_ref = transaction.tx_ref;

    // 1. Statut local: seule la PREMIÈRE transition passe
    if !claim_pending(db, &tx_ref, "paid").await? {
        return Ok(());
    }

    // 2. Historique append-only
    let purchase = PurchaseActiveModel {
        student_id: Set(student_id),
        course_id: Set(course_id),
        payment_status: Set("paid".to_string()),
        transaction_date: Set(chrono::Utc::now()),
        amount: Set(Some(amount)),
        tx_ref: Set(Some(tx_ref)),
        ..Default::default()
    };
    purchase.insert(db).await?;

    // 3. Inscription (une seule par paire étudiant/cours)
    let existing = Enrollments::find()
        .filter(EnrollmentColumn::StudentId.eq(student_id))
        .filter(EnrollmentColumn::CourseId.eq(course_id))
        .one(db)
        .await?;

    if existing.is_none() {
        let enrollment = EnrollmentActiveModel {
            student_id: Set(student_id),
            course_id: Set(course_id),
            progress: Set(0),
            enrolled_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        enrollment.insert(db).await?;
    }

    Ok(())
}

/// Transition pending → failed: statut local + historique 'failed'
async fn settle_failed(
    db: &DatabaseConnection,
    transaction: payment_transactions::Model,
) -> Result<(), sea_orm::DbErr> {
    let student_id = transaction.student_id;
    let course_id = transaction.course_id;
    let amount = transaction.amount;
    let tx_ref = transaction.tx_ref;

    if !claim_pending(db, &tx_ref, "failed").await? {
        return Ok(());
    }

    let purchase = PurchaseActiveModel {
        student_id: Set(student_id),
        course_id: Set(course_id),
        payment_status: Set("failed".to_string()),
        transaction_date: Set(chrono::Utc::now()),
        amount: Set(Some(amount)),
        tx_ref: Set(Some(tx_ref)),
        ..Default::default()
    };
    purchase.insert(db).await?;

    Ok(())
}

pub fn payment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payment")
            .service(initiate_payment)
            .service(verify_payment)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_claim_pending_is_a_conditional_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let claimed = claim_pending(&db, "tx-abc", "paid").await.unwrap();
        assert!(claimed);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);

        // L'UPDATE doit être filtré sur le tx_ref ET sur status = 'pending'
        let statement = format!("{:?}", log[0]);
        assert!(statement.contains("UPDATE"));
        assert!(statement.contains("tx_ref"));
        assert!(statement.contains("status"));
        assert!(statement.contains("pending"));
    }

    #[tokio::test]
    async fn test_claim_already_settled_skips_side_effects() {
        // Une autre vérification a déjà réclamé la transition: 0 ligne touchée
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let transaction = payment_transactions::Model {
            id: 1,
            tx_ref: "tx-abc".to_string(),
            student_id: 7,
            course_id: 3,
            amount: Decimal::new(10000, 2),
            email: "abebe@example.com".to_string(),
            full_name: "Abebe Kebede".to_string(),
            status: "pending".to_string(),
            created_at: chrono::Utc::now(),
        };

        settle_paid(&db, transaction).await.unwrap();

        // Seul l'UPDATE conditionnel est parti: ni historique, ni inscription
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
    }
}
