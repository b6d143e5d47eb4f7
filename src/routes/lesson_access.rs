use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set};
use sea_orm::sea_query::OnConflict;
use serde::{Deserialize, Serialize};

use crate::models::lesson_access::{self, Entity as LessonAccess, Column as AccessColumn, ActiveModel as AccessActiveModel};
use crate::middleware::AuthUser;

// DTO pour accorder un accès
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    pub student_id: i32,
    pub lesson_id: i32,
}

// Réponse du check d'accès
#[derive(Serialize)]
pub struct AccessCheckResponse {
    pub access: bool,
}

/// POST /api/lesson-access - Accorder l'accès à une leçon (upsert idempotent)
///
/// L'écriture est un SEUL upsert conditionnel appuyé sur l'index unique
/// (student_id, lesson_id): deux grants concurrents sur une paire jamais vue
/// ne peuvent pas créer deux enregistrements. Le find préalable sert
/// uniquement à choisir le code de statut (201 création, 200 mise à jour).
#[post("")]
pub async fn grant_access(
    _auth_user: AuthUser,
    body: web::Json<GrantAccessRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Regarder si la paire existe déjà (pour le code de statut seulement)
    let existing = LessonAccess::find()
        .filter(AccessColumn::StudentId.eq(body.student_id))
        .filter(AccessColumn::LessonId.eq(body.lesson_id))
        .one(db.get_ref())
        .await;

    let already_exists = match existing {
        Ok(record) => record.is_some(),
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Failed to grant access: {}", e)
            }));
        }
    };

    // 2. Upsert atomique: créer accessible, ou repasser is_accessible à true
    let result = upsert_access(db.get_ref(), body.student_id, body.lesson_id).await;

    match result {
        Ok(record) if already_exists => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Access updated successfully",
            "access": record,
        })),
        Ok(record) => HttpResponse::Created().json(record),
        Err(e) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to grant access: {}", e)
        })),
    }
}

/// Écrit l'accès en un SEUL statement INSERT ... ON CONFLICT DO UPDATE.
/// Toute la garantie de concurrence du grant tient dans cette forme: ne pas
/// remplacer par un find puis un save séparés.
pub async fn upsert_access(
    db: &DatabaseConnection,
    student_id: i32,
    lesson_id: i32,
) -> Result<lesson_access::Model, sea_orm::DbErr> {
    let new_access = AccessActiveModel {
        student_id: Set(student_id),
        lesson_id: Set(lesson_id),
        is_accessible: Set(true),
        ..Default::default()
    };

    LessonAccess::insert(new_access)
        .on_conflict(
            OnConflict::columns([AccessColumn::StudentId, AccessColumn::LessonId])
                .update_column(AccessColumn::IsAccessible)
                .to_owned(),
        )
        .exec_with_returning(db)
        .await
}

/// GET /api/lesson-access/{student_id}/{lesson_id} - Vérifier l'accès
///
/// true seulement si un enregistrement existe ET is_accessible = true.
/// L'absence d'enregistrement est une réponse valide (false), jamais une erreur.
#[get("/{student_id}/{lesson_id}")]
pub async fn check_access(
    _auth_user: AuthUser,
    path: web::Path<(i32, i32)>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (student_id, lesson_id) = path.into_inner();

    let record = lesson_access::Entity::find()
        .filter(AccessColumn::StudentId.eq(student_id))
        .filter(AccessColumn::LessonId.eq(lesson_id))
        .one(db.get_ref())
        .await;

    match record {
        Ok(record) => {
            let access = record.map(|r| r.is_accessible).unwrap_or(false);
            HttpResponse::Ok().json(AccessCheckResponse { access })
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to check access: {}", e)
        })),
    }
}

pub fn lesson_access_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lesson-access")
            .service(grant_access)
            .service(check_access)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_grant_issues_single_on_conflict_upsert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![lesson_access::Model {
                id: 1,
                student_id: 7,
                lesson_id: 42,
                is_accessible: true,
            }]])
            .into_connection();

        let record = upsert_access(&db, 7, 42).await.unwrap();
        assert_eq!(record.student_id, 7);
        assert_eq!(record.lesson_id, 42);
        assert!(record.is_accessible);

        // Un seul aller-retour SQL, pas de find puis save
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);

        let statement = format!("{:?}", log[0]);
        assert!(statement.contains("INSERT"));
        assert!(statement.contains("ON CONFLICT"));
        assert!(statement.contains("student_id"));
        assert!(statement.contains("lesson_id"));
        assert!(statement.contains("DO UPDATE"));
    }
}
