use actix_web::{post, get, put, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::users::{Entity as Users, Column as UserColumn, ActiveModel as UserActiveModel};
use crate::utils::{password, jwt};
use crate::middleware::AuthUser;

const VALID_ROLES: [&str; 4] = ["student", "instructor", "admin", "approver"];

// DTO pour l'inscription
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "fullName is required"))]
    pub full_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: String,
}

// DTO pour la connexion
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// DTO pour l'édition du profil (self-service)
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

// Réponse après login/register
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub approval_status: Option<String>,
}

/// POST /api/auth/register - Créer un compte (PUBLIC)
/// Les instructeurs démarrent avec approval_status = 'pending':
/// un approver doit valider leur candidature avant publication de cours.
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Valider le payload
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Validation error: {}", e)
        }));
    }

    if !VALID_ROLES.contains(&body.role.as_str()) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid role. Must be one of: student, instructor, admin, approver"
        }));
    }

    // 2. Vérifier si l'email existe déjà
    let existing_user = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await;

    match existing_user {
        Ok(Some(_)) => {
            return HttpResponse::Conflict().json(serde_json::json!({
                "error": "Email already registered"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
        _ => {}
    }

    // 3. Hash le mot de passe
    let password_hash = match password::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to hash password: {}", e)
            }));
        }
    };

    // 4. Créer l'utilisateur (candidature en attente pour les instructeurs)
    let approval_status = if body.role == "instructor" {
        Some("pending".to_string())
    } else {
        None
    };

    let new_user = UserActiveModel {
        full_name: Set(body.full_name.clone()),
        email: Set(body.email.clone()),
        password_hash: Set(password_hash),
        role: Set(body.role.clone()),
        approval_status: Set(approval_status.clone()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let user = match new_user.insert(db.get_ref()).await {
        Ok(user) => user,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create user: {}", e)
            }));
        }
    };

    // 5. Générer le JWT
    let token = match jwt::generate_token(user.id, &user.email, &user.role) {
        Ok(token) => token,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to generate token: {}", e)
            }));
        }
    };

    HttpResponse::Created().json(AuthResponse {
        token,
        user_id: user.id,
        full_name: user.full_name,
        email: user.email,
        role: user.role,
        approval_status,
    })
}

/// POST /api/auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Trouver l'utilisateur
    let user = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await;

    let user = match user {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid email or password"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // 2. Vérifier le mot de passe
    let is_valid = match password::verify_password(&body.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Password verification error: {}", e)
            }));
        }
    };

    if !is_valid {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid email or password"
        }));
    }

    // 3. Générer le JWT
    let token = match jwt::generate_token(user.id, &user.email, &user.role) {
        Ok(token) => token,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to generate token: {}", e)
            }));
        }
    };

    HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: user.id,
        full_name: user.full_name,
        email: user.email,
        role: user.role,
        approval_status: user.approval_status,
    })
}

/// GET /api/auth/me - Vérifier le token (PROTÉGÉE)
#[get("/me")]
pub async fn me(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match Users::find_by_id(auth_user.user_id).one(db.get_ref()).await {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "User not found"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// PUT /api/auth/profile - Modifier son profil (PROTÉGÉE)
#[put("/profile")]
pub async fn update_profile(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Validation error: {}", e)
        }));
    }

    // 1. Récupérer l'utilisateur
    let user = match Users::find_by_id(auth_user.user_id).one(db.get_ref()).await {
        Ok(Some(user)) => user,
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
    };

    // 2. Appliquer les champs fournis
    let mut active_model: UserActiveModel = user.into();
    if let Some(full_name) = &body.full_name {
        active_model.full_name = Set(full_name.clone());
    }
    if let Some(email) = &body.email {
        active_model.email = Set(email.clone());
    }

    match active_model.update(db.get_ref()).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update profile: {}", e)
        })),
    }
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(me)
            .service(update_profile)
    );
}
