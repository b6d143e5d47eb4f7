use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait, ModelTrait};

use crate::models::users::{Entity as Users, Column as UserColumn, ActiveModel as UserActiveModel};
use crate::middleware::AuthUser;

/// GET /api/approvals/pending - Candidatures d'instructeurs en attente (APPROVER)
#[get("/pending")]
pub async fn list_pending(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.can_moderate_instructors() {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only approvers can review instructor applications"
        }));
    }

    let pending = Users::find()
        .filter(UserColumn::Role.eq("instructor"))
        .filter(UserColumn::ApprovalStatus.eq("pending"))
        .all(db.get_ref())
        .await;

    match pending {
        Ok(pending) => HttpResponse::Ok().json(pending),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch pending applications: {}", e)
        })),
    }
}

/// POST /api/approvals/{user_id}/approve - Approuver un instructeur (APPROVER)
#[post("/{user_id}/approve")]
pub async fn approve_instructor(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.can_moderate_instructors() {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only approvers can review instructor applications"
        }));
    }

    let user_id = path.into_inner();

    // 1. Charger la candidature en attente
    let user = match find_pending_instructor(db.get_ref(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "No pending instructor application for this user"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // 2. Passer le statut à 'approved'
    let mut active_model: UserActiveModel = user.into();
    active_model.approval_status = Set(Some("approved".to_string()));

    match active_model.update(db.get_ref()).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Instructor approved",
            "user": user,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to approve instructor: {}", e)
        })),
    }
}

/// POST /api/approvals/{user_id}/reject - Rejeter un instructeur (APPROVER)
/// Le rejet SUPPRIME la candidature en attente (pas de tombstone 'rejected'
/// conservé: c'est le comportement attendu par le front).
#[post("/{user_id}/reject")]
pub async fn reject_instructor(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.can_moderate_instructors() {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only approvers can review instructor applications"
        }));
    }

    let user_id = path.into_inner();

    let user = match find_pending_instructor(db.get_ref(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "No pending instructor application for this user"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match user.delete(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Instructor application rejected and removed",
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to reject instructor: {}", e)
        })),
    }
}

async fn find_pending_instructor(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<crate::models::users::Model>, sea_orm::DbErr> {
    Users::find()
        .filter(UserColumn::Id.eq(user_id))
        .filter(UserColumn::Role.eq("instructor"))
        .filter(UserColumn::ApprovalStatus.eq("pending"))
        .one(db)
        .await
}

pub fn approvals_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/approvals")
            .service(list_pending)
            .service(approve_instructor)
            .service(reject_instructor)
    );
}
