use actix_multipart::Multipart;
use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, ColumnTrait, Set, ActiveModelTrait, PaginatorTrait};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    courses::Entity as Courses,
    lessons::{self, Entity as Lessons, Column as LessonColumn, ActiveModel as LessonActiveModel},
};
use crate::middleware::AuthUser;
use crate::services::upload::{collect_form, UploadPolicy};
use crate::services::video_service::VideoService;

const VALID_LESSON_TYPES: [&str; 2] = ["video", "quiz"];

// DTO pour créer une leçon
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub title: String,
    pub lesson_type: String, // 'video', 'quiz'
    pub position: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub quiz_content: Option<Value>,
}

/// Valide la structure du contenu quiz: une liste de questions, chacune avec
/// au moins 2 options et un indice de bonne réponse valide
pub fn validate_quiz_content(content: &Value) -> Result<(), String> {
    let questions = content
        .as_array()
        .ok_or("quizContent must be an array of questions")?;

    if questions.is_empty() {
        return Err("quizContent must contain at least one question".to_string());
    }

    for (i, question) in questions.iter().enumerate() {
        if question["question"].as_str().map(|q| q.trim().is_empty()).unwrap_or(true) {
            return Err(format!("Question {} is missing its text", i + 1));
        }

        let options = question["options"]
            .as_array()
            .ok_or_else(|| format!("Question {} is missing its options", i + 1))?;
        if options.len() < 2 {
            return Err(format!("Question {} needs at least 2 options", i + 1));
        }

        let correct = question["correct_option"]
            .as_u64()
            .ok_or_else(|| format!("Question {} is missing correct_option", i + 1))?;
        if correct as usize >= options.len() {
            return Err(format!(
                "Question {} has correct_option {} but only {} options",
                i + 1,
                correct,
                options.len()
            ));
        }
    }

    Ok(())
}

/// POST /api/courses/{course_id}/lessons - Créer une leçon (PROPRIÉTAIRE)
/// Une leçon vidéo démarre en video_status = 'pending': l'asset est rattaché
/// plus tard, une fois l'encodage du provider terminé
#[post("/courses/{course_id}/lessons")]
pub async fn create_lesson(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<CreateLessonRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

    // 1. Vérifier la propriété du cours
    let course = match Courses::find_by_id(course_id).one(db.get_ref()).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if course.instructor_id != auth_user.user_id {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only the owning instructor can add lessons"
        }));
    }

    // 2. Valider le type et le contenu
    if !VALID_LESSON_TYPES.contains(&body.lesson_type.as_str()) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid lessonType. Must be one of: video, quiz"
        }));
    }

    if body.title.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "'title' is required"
        }));
    }

    let quiz_content = if body.lesson_type == "quiz" {
        let content = match &body.quiz_content {
            Some(content) => content,
            None => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "quizContent is required for quiz lessons"
                }));
            }
        };
        if let Err(e) = validate_quiz_content(content) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e
            }));
        }
        Some(content.clone())
    } else {
        None
    };

    let video_status = if body.lesson_type == "video" {
        Some("pending".to_string())
    } else {
        None
    };

    // 3. Position par défaut: à la suite des leçons existantes
    let position = match body.position {
        Some(p) => p,
        None => match next_position(db.get_ref(), course_id).await {
            Ok(p) => p,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to create lesson: {}", e)
                }));
            }
        },
    };

    let new_lesson = LessonActiveModel {
        course_id: Set(course_id),
        title: Set(body.title.clone()),
        position: Set(position),
        lesson_type: Set(body.lesson_type.clone()),
        duration_seconds: Set(body.duration_seconds),
        quiz_content: Set(quiz_content),
        video_status: Set(video_status),
        ..Default::default()
    };

    match new_lesson.insert(db.get_ref()).await {
        Ok(lesson) => HttpResponse::Created().json(lesson),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create lesson: {}", e)
        })),
    }
}

/// GET /api/courses/{course_id}/lessons - Leçons d'un cours, par position
#[get("/courses/{course_id}/lessons")]
pub async fn list_lessons(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

    let lesson_list = Lessons::find()
        .filter(LessonColumn::CourseId.eq(course_id))
        .order_by_asc(LessonColumn::Position)
        .all(db.get_ref())
        .await;

    match lesson_list {
        Ok(lesson_list) => HttpResponse::Ok().json(lesson_list),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch lessons: {}", e)
        })),
    }
}

/// POST /api/lessons/{lesson_id}/upload-videos - Téléverser la vidéo (PROPRIÉTAIRE)
/// Multipart, champ 'lessonVideo' (mp4/avi/mov/mkv, 50 MB max). Le fichier est
/// stocké localement puis poussé chez le provider; la leçon passe en
/// 'processing' (ou directement 'ready' si le provider renvoie déjà les URLs).
#[post("/lessons/{lesson_id}/upload-videos")]
pub async fn upload_lesson_video(
    auth_user: AuthUser,
    path: web::Path<i32>,
    payload: Multipart,
    db: web::Data<DatabaseConnection>,
    video_service: web::Data<VideoService>,
) -> HttpResponse {
    let lesson_id = path.into_inner();

    // 1. Charger la leçon + vérifier la propriété via le cours
    let lesson = match load_owned_video_lesson(db.get_ref(), lesson_id, &auth_user).await {
        Ok(lesson) => lesson,
        Err(response) => return response,
    };

    // 2. Recevoir le fichier (politique vidéo); rejet → 400
    let policy = UploadPolicy::lesson_video();
    let stored = match collect_form(payload, &policy).await {
        Ok((_, Some(file))) => file,
        Ok((_, None)) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing 'lessonVideo' file"
            }));
        }
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e
            }));
        }
    };

    // 3. Si une vidéo existait déjà, supprimer l'ancienne chez le provider
    if let Some(old_video_id) = &lesson.video_id {
        if let Err(e) = video_service.delete(old_video_id).await {
            eprintln!("⚠️  Failed to delete previous video {}: {}", old_video_id, e);
        }
    }

    // 4. Créer + téléverser chez le provider (l'erreur est transmise telle quelle)
    let asset = match video_service
        .create_and_upload(&stored.path, &lesson.title, false)
        .await
    {
        Ok(asset) => asset,
        Err(e) => {
            return HttpResponse::BadGateway().json(serde_json::json!({
                "error": e
            }));
        }
    };

    // 5. Avancer la machine à états: pending → processing (ou ready si les
    //    URLs de lecture sont déjà disponibles)
    let next_status = if asset.playback_url.is_some() { "ready" } else { "processing" };

    let mut active_model: LessonActiveModel = lesson.into();
    active_model.video_id = Set(Some(asset.video_id.clone()));
    active_model.hls_url = Set(asset.hls_url.clone());
    active_model.mp4_url = Set(asset.mp4_url.clone());
    active_model.playback_url = Set(asset.playback_url.clone());
    active_model.video_status = Set(Some(next_status.to_string()));

    match active_model.update(db.get_ref()).await {
        Ok(lesson) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "lesson": lesson,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to attach video: {}", e)
        })),
    }
}

/// POST /api/lessons/{lesson_id}/refresh-video-status - Réconciliation
/// Interroge le provider et avance processing → ready/failed.
/// Sans effet sur une leçon déjà dans un état terminal.
#[post("/lessons/{lesson_id}/refresh-video-status")]
pub async fn refresh_video_status(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    video_service: web::Data<VideoService>,
) -> HttpResponse {
    let lesson_id = path.into_inner();

    let lesson = match load_owned_video_lesson(db.get_ref(), lesson_id, &auth_user).await {
        Ok(lesson) => lesson,
        Err(response) => return response,
    };

    let video_id = match &lesson.video_id {
        Some(id) => id.clone(),
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Lesson has no uploaded video yet"
            }));
        }
    };

    // État terminal: rien à réconcilier
    let current = lesson.video_status.as_deref().unwrap_or("pending");
    if current == "ready" || current == "failed" {
        return HttpResponse::Ok().json(serde_json::json!({
            "videoStatus": current,
            "lesson": lesson,
        }));
    }

    let status = match video_service.get_status(&video_id).await {
        Ok(status) => status,
        Err(e) => {
            return HttpResponse::BadGateway().json(serde_json::json!({
                "error": e
            }));
        }
    };

    let next_status = if status.failed {
        "failed"
    } else if status.playable {
        "ready"
    } else {
        "processing"
    };

    // En passant 'ready', rafraîchir aussi les URLs de lecture
    let asset = if next_status == "ready" {
        video_service.get_video(&video_id).await.ok()
    } else {
        None
    };

    let mut active_model: LessonActiveModel = lesson.into();
    active_model.video_status = Set(Some(next_status.to_string()));
    if let Some(asset) = asset {
        if asset.hls_url.is_some() {
            active_model.hls_url = Set(asset.hls_url);
        }
        if asset.mp4_url.is_some() {
            active_model.mp4_url = Set(asset.mp4_url);
        }
        if asset.playback_url.is_some() {
            active_model.playback_url = Set(asset.playback_url);
        }
    }

    match active_model.update(db.get_ref()).await {
        Ok(lesson) => HttpResponse::Ok().json(serde_json::json!({
            "videoStatus": next_status,
            "lesson": lesson,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update video status: {}", e)
        })),
    }
}

/// Position suivante dans le cours, via un COUNT côté base plutôt qu'un
/// chargement de toutes les leçons
async fn next_position(db: &DatabaseConnection, course_id: i32) -> Result<i32, sea_orm::DbErr> {
    let count = Lessons::find()
        .filter(LessonColumn::CourseId.eq(course_id))
        .count(db)
        .await?;

    Ok(count as i32 + 1)
}

/// Charge une leçon vidéo et vérifie que l'appelant possède son cours
async fn load_owned_video_lesson(
    db: &DatabaseConnection,
    lesson_id: i32,
    auth_user: &AuthUser,
) -> Result<lessons::Model, HttpResponse> {
    let lesson = match Lessons::find_by_id(lesson_id).one(db).await {
        Ok(Some(lesson)) => lesson,
        Ok(None) => {
            return Err(HttpResponse::NotFound().json(serde_json::json!({
                "error": "Lesson not found"
            })));
        }
        Err(e) => {
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            })));
        }
    };

    if lesson.lesson_type != "video" {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "This lesson is not a video lesson"
        })));
    }

    let course = match Courses::find_by_id(lesson.course_id).one(db).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return Err(HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not found"
            })));
        }
        Err(e) => {
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            })));
        }
    };

    if course.instructor_id != auth_user.user_id {
        return Err(HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only the owning instructor can manage this lesson"
        })));
    }

    Ok(lesson)
}

pub fn lessons_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_lesson)
        .service(list_lessons)
        .service(upload_lesson_video)
        .service(refresh_video_status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    #[test]
    fn test_valid_quiz_accepted() {
        let content = json!([
            {"question": "2 + 2 ?", "options": ["3", "4", "5"], "correct_option": 1}
        ]);
        assert!(validate_quiz_content(&content).is_ok());
    }

    #[test]
    fn test_quiz_must_be_array() {
        assert!(validate_quiz_content(&json!({"question": "?"})).is_err());
        assert!(validate_quiz_content(&json!([])).is_err());
    }

    #[test]
    fn test_quiz_needs_two_options() {
        let content = json!([
            {"question": "Oui ?", "options": ["oui"], "correct_option": 0}
        ]);
        assert!(validate_quiz_content(&content).is_err());
    }

    #[test]
    fn test_quiz_correct_option_in_range() {
        let content = json!([
            {"question": "2 + 2 ?", "options": ["3", "4"], "correct_option": 2}
        ]);
        assert!(validate_quiz_content(&content).is_err());
    }

    #[test]
    fn test_quiz_missing_question_text() {
        let content = json!([
            {"options": ["a", "b"], "correct_option": 0}
        ]);
        assert!(validate_quiz_content(&content).is_err());
    }

    #[tokio::test]
    async fn test_next_position_uses_count_query() {
        let count_row: std::collections::BTreeMap<&str, sea_orm::Value> =
            [("num_items", sea_orm::Value::BigInt(Some(3)))]
                .into_iter()
                .collect();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row]])
            .into_connection();

        let position = next_position(&db, 2).await.unwrap();
        assert_eq!(position, 4);

        // Un COUNT côté base, pas un chargement de toutes les leçons
        let log = db.into_transaction_log();
        let statement = format!("{:?}", log[0]);
        assert!(statement.contains("COUNT"));
    }
}
