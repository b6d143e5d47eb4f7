pub mod health;
pub mod auth;
pub mod approvals;
pub mod courses;
pub mod lessons;
pub mod lesson_access;
pub mod purchase_history;
pub mod payment;
pub mod enrollments;
pub mod translate;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(approvals::approvals_routes)
            // Les ressources imbriquées /courses/{id}/lessons d'abord,
            // pour qu'elles ne soient pas absorbées par le scope /courses
            .configure(lessons::lessons_routes)
            .configure(courses::courses_routes)
            .configure(lesson_access::lesson_access_routes)
            .configure(purchase_history::purchase_history_routes)
            .configure(payment::payment_routes)
            .configure(enrollments::enrollments_routes)
            .configure(translate::translate_routes)
    );
}
