use actix_multipart::Multipart;
use actix_web::{post, get, put, patch, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, ColumnTrait, Set, ActiveModelTrait};
use serde::Deserialize;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::models::{
    courses::{self, Entity as Courses, Column as CourseColumn, ActiveModel as CourseActiveModel},
    lessons::{Entity as Lessons, Column as LessonColumn},
    users::{Entity as Users, Column as UserColumn},
    dto::{CourseWithInstructor, CourseDetail},
};
use crate::middleware::AuthUser;
use crate::services::upload::{collect_form, UploadPolicy};

const VALID_LEVELS: [&str; 3] = ["beginner", "intermediate", "advanced"];

// DTO pour l'édition d'un cours (JSON, champs optionnels)
#[derive(Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub price: Option<Decimal>,
}

/// POST /api/courses - Créer un cours (INSTRUCTEUR APPROUVÉ)
/// Formulaire multipart: champs texte + image de couverture optionnelle
/// (champ 'courseImage', politique images: jpeg/jpg/png/gif, 5 MB max)
#[post("")]
pub async fn create_course(
    auth_user: AuthUser,
    payload: Multipart,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Seul un instructeur approuvé peut publier
    match Users::find_by_id(auth_user.user_id).one(db.get_ref()).await {
        Ok(Some(user)) => {
            if user.role != "instructor" || user.approval_status.as_deref() != Some("approved") {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "Only approved instructors can create courses"
                }));
            }
        }
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    }

    // 2. Collecter le formulaire (le rejet d'upload devient un 400, pas un 500)
    let policy = UploadPolicy::course_image();
    let (fields, cover) = match collect_form(payload, &policy).await {
        Ok(result) => result,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e
            }));
        }
    };

    // 3. Champs requis
    let title = match fields.get("title").filter(|t| !t.trim().is_empty()) {
        Some(t) => t.clone(),
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'title' is required"
            }));
        }
    };
    let description = fields.get("description").cloned().unwrap_or_default();
    let category = match fields.get("category").filter(|c| !c.trim().is_empty()) {
        Some(c) => c.clone(),
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'category' is required"
            }));
        }
    };

    let level = fields.get("level").cloned().unwrap_or_else(|| "beginner".to_string());
    if !VALID_LEVELS.contains(&level.as_str()) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid level. Must be one of: beginner, intermediate, advanced"
        }));
    }

    let price = match fields.get("price").map(|p| Decimal::from_str(p)) {
        Some(Ok(price)) if price >= Decimal::ZERO => price,
        Some(_) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'price' must be a non-negative number"
            }));
        }
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "'price' is required"
            }));
        }
    };

    // 4. Insérer le cours
    let new_course = CourseActiveModel {
        title: Set(title),
        description: Set(description),
        category: Set(category),
        level: Set(level),
        price: Set(price),
        instructor_id: Set(auth_user.user_id),
        cover_image: Set(cover.map(|f| f.path)),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    match new_course.insert(db.get_ref()).await {
        Ok(course) => HttpResponse::Created().json(course),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create course: {}", e)
        })),
    }
}

/// GET /api/courses - Listing côté étudiant (cours actifs uniquement)
/// Le nom de l'instructeur est résolu à la lecture, en une seule query
#[get("")]
pub async fn list_courses(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let courses_result = Courses::find()
        .filter(CourseColumn::IsActive.eq(true))
        .order_by_desc(CourseColumn::CreatedAt)
        .all(db.get_ref())
        .await;

    match courses_result {
        Ok(course_list) => match with_instructor_names(db.get_ref(), course_list).await {
            Ok(response) => HttpResponse::Ok().json(response),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to resolve instructors: {}", e)
            })),
        },
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch courses: {}", e)
        })),
    }
}

/// GET /api/courses/all - Tous les cours, actifs ou non (ADMIN)
#[get("/all")]
pub async fn list_all_courses(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.is_admin() {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only admins can list all courses"
        }));
    }

    let courses_result = Courses::find()
        .order_by_desc(CourseColumn::CreatedAt)
        .all(db.get_ref())
        .await;

    match courses_result {
        Ok(course_list) => match with_instructor_names(db.get_ref(), course_list).await {
            Ok(response) => HttpResponse::Ok().json(response),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to resolve instructors: {}", e)
            })),
        },
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch courses: {}", e)
        })),
    }
}

/// GET /api/courses/mine - Les cours de l'instructeur connecté
#[get("/mine")]
pub async fn list_my_courses(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let courses_result = Courses::find()
        .filter(CourseColumn::InstructorId.eq(auth_user.user_id))
        .order_by_desc(CourseColumn::CreatedAt)
        .all(db.get_ref())
        .await;

    match courses_result {
        Ok(course_list) => HttpResponse::Ok().json(course_list),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to fetch courses: {}", e)
        })),
    }
}

/// GET /api/courses/{id} - Détail d'un cours avec ses leçons
/// Un cours inactif n'est visible que par son instructeur ou un admin
#[get("/{id}")]
pub async fn get_course(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

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

    if !course.is_active
        && course.instructor_id != auth_user.user_id
        && !auth_user.is_admin()
    {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "Course not found"
        }));
    }

    // Leçons ordonnées par position
    let lessons = match Lessons::find()
        .filter(LessonColumn::CourseId.eq(course_id))
        .order_by_asc(LessonColumn::Position)
        .all(db.get_ref())
        .await
    {
        Ok(lessons) => lessons,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to fetch lessons: {}", e)
            }));
        }
    };

    // Nom de l'instructeur résolu à la lecture
    let instructor_name = Users::find_by_id(course.instructor_id)
        .one(db.get_ref())
        .await
        .ok()
        .flatten()
        .map(|u| u.full_name);

    HttpResponse::Ok().json(CourseDetail {
        course: to_course_with_instructor(course, instructor_name),
        lessons,
    })
}

/// PUT /api/courses/{id} - Modifier un cours (INSTRUCTEUR PROPRIÉTAIRE)
#[put("/{id}")]
pub async fn update_course(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateCourseRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

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
            "error": "Only the owning instructor can edit this course"
        }));
    }

    if let Some(level) = &body.level {
        if !VALID_LEVELS.contains(&level.as_str()) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid level. Must be one of: beginner, intermediate, advanced"
            }));
        }
    }

    let mut active_model: CourseActiveModel = course.into();
    if let Some(title) = &body.title {
        active_model.title = Set(title.clone());
    }
    if let Some(description) = &body.description {
        active_model.description = Set(description.clone());
    }
    if let Some(category) = &body.category {
        active_model.category = Set(category.clone());
    }
    if let Some(level) = &body.level {
        active_model.level = Set(level.clone());
    }
    if let Some(price) = body.price {
        active_model.price = Set(price);
    }

    match active_model.update(db.get_ref()).await {
        Ok(course) => HttpResponse::Ok().json(course),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update course: {}", e)
        })),
    }
}

/// PATCH /api/courses/{id}/visibility - Basculer la visibilité (ADMIN)
/// La modération ne supprime jamais le contenu: elle ne touche qu'au flag
#[patch("/{id}/visibility")]
pub async fn toggle_visibility(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.is_admin() {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only admins can moderate course visibility"
        }));
    }

    let course_id = path.into_inner();

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

    let new_state = !course.is_active;
    let mut active_model: CourseActiveModel = course.into();
    active_model.is_active = Set(new_state);

    match active_model.update(db.get_ref()).await {
        Ok(course) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "isActive": course.is_active,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to toggle visibility: {}", e)
        })),
    }
}

/// Résout les noms d'instructeurs en UNE query (lookup HashMap, pas N queries)
async fn with_instructor_names(
    db: &DatabaseConnection,
    course_list: Vec<courses::Model>,
) -> Result<Vec<CourseWithInstructor>, sea_orm::DbErr> {
    let instructor_ids: Vec<i32> = course_list
        .iter()
        .map(|c| c.instructor_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let instructors = Users::find()
        .filter(UserColumn::Id.is_in(instructor_ids))
        .all(db)
        .await?;

    let names_map: HashMap<i32, String> = instructors
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();

    Ok(course_list
        .into_iter()
        .map(|course| {
            let name = names_map.get(&course.instructor_id).cloned();
            to_course_with_instructor(course, name)
        })
        .collect())
}

fn to_course_with_instructor(
    course: courses::Model,
    instructor_name: Option<String>,
) -> CourseWithInstructor {
    CourseWithInstructor {
        id: course.id,
        title: course.title,
        description: course.description,
        category: course.category,
        level: course.level,
        price: course.price,
        cover_image: course.cover_image,
        is_active: course.is_active,
        instructor_id: course.instructor_id,
        instructor_name,
    }
}

pub fn courses_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/courses")
            .service(create_course)
            .service(list_courses)
            // Les chemins fixes avant le paramétrique {id}
            .service(list_all_courses)
            .service(list_my_courses)
            .service(get_course)
            .service(update_course)
            .service(toggle_visibility)
    );
}
