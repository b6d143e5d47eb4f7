mod models;
mod routes;
mod db;
mod services;
mod utils;
mod middleware;

use actix_web::{App, HttpServer, web};
use services::payment_service::PaymentService;
use services::translation_service::TranslationService;
use services::upload;
use services::video_service::VideoService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    println!("🔌 Connecting to database...");
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    println!("✅ Database connected!");

    // Répertoires d'upload (uploads/courseImages, uploads/lessonVideos)
    upload::ensure_upload_dirs().expect("Failed to create upload directories");

    // Adapters externes: construits UNE fois ici puis injectés dans les
    // handlers (pas d'état global paresseux). Les credentials manquantes
    // ne bloquent pas le démarrage, l'erreur sort au moment de l'appel.
    let video_service = VideoService::from_env();
    let payment_service = PaymentService::from_env();
    let translation_service = TranslationService::from_env();

    println!("🚀 Starting server on http://127.0.0.1:8080");

    // web::Data est un Arc: clonable même quand DatabaseConnection ne l'est
    // pas (feature `mock` activée par les dev-dependencies).
    let db = web::Data::new(db);

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(web::Data::new(video_service.clone()))
            .app_data(web::Data::new(payment_service.clone()))
            .app_data(web::Data::new(translation_service.clone()))
            .configure(routes::configure_routes)
    })
        .bind(("127.0.0.1", 8080))?
        .run()
        .await
}
