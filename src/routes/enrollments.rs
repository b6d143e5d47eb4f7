use actix_web::{get, patch, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{
    enrollments::{Entity as Enrollments, Column as EnrollmentColumn, ActiveModel as EnrollmentActiveModel},
    courses::{Entity as Courses, Column as CourseColumn},
    dto::EnrollmentWithCourse,
};
use crate::middleware::AuthUser;

// DTO pour mettre à jour la progression
#[derive(Deserialize)]
pub struct UpdateProgressRequest {
    pub progress: i32, // 0 à 100
}

/// GET /api/enrollments/{student_id} - Inscriptions d'un étudiant
/// Les infos du cours sont résolues à la lecture, en une seule query
#[get("/{student_id}")]
pub async fn list_enrollments(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let student_id = path.into_inner();

    let enrollment_list = match Enrollments::find()
        .filter(EnrollmentColumn::StudentId.eq(student_id))
        .all(db.get_ref())
        .await
    {
        Ok(list) => list,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to fetch enrollments: {}", e)
            }));
        }
    };

    let course_ids: Vec<i32> = enrollment_list.iter().map(|e| e.course_id).collect();

    let courses = match Courses::find()
        .filter(CourseColumn::Id.is_in(course_ids))
        .all(db.get_ref())
        .await
    {
        Ok(courses) => courses,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to fetch courses: {}", e)
            }));
        }
    };

    let courses_map: HashMap<i32, _> = courses.into_iter().map(|c| (c.id, c)).collect();

    let response: Vec<EnrollmentWithCourse> = enrollment_list
        .into_iter()
        .map(|enrollment| {
            let course = courses_map.get(&enrollment.course_id);
            EnrollmentWithCourse {
                id: enrollment.id,
                course_id: enrollment.course_id,
                course_title: course.map(|c| c.title.clone()),
                cover_image: course.and_then(|c| c.cover_image.clone()),
                progress: enrollment.progress,
                enrolled_at: enrollment.enrolled_at,
            }
        })
        .collect();

    HttpResponse::Ok().json(response)
}

/// PATCH /api/enrollments/{id}/progress - Mettre à jour la progression
#[patch("/{id}/progress")]
pub async fn update_progress(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateProgressRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !(0..=100).contains(&body.progress) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "progress must be between 0 and 100"
        }));
    }

    let enrollment_id = path.into_inner();

    let enrollment = match Enrollments::find_by_id(enrollment_id).one(db.get_ref()).await {
        Ok(Some(enrollment)) => enrollment,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Enrollment not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // Seul l'étudiant inscrit met à jour sa propre progression
    if enrollment.student_id != auth_user.user_id {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only update your own progress"
        }));
    }

    let mut active_model: EnrollmentActiveModel = enrollment.into();
    active_model.progress = Set(body.progress);

    match active_model.update(db.get_ref()).await {
        Ok(enrollment) => HttpResponse::Ok().json(enrollment),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update progress: {}", e)
        })),
    }
}

pub fn enrollments_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/enrollments")
            .service(list_enrollments)
            .service(update_progress)
    );
}
