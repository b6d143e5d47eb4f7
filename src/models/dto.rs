//pour les réponses dénormalisées (jointures résolues au moment de la lecture)
use serde::Serialize;
use rust_decimal::Decimal;

// 1 cours + le nom de son instructeur (listing étudiant)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWithInstructor {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub price: Decimal,
    pub cover_image: Option<String>,
    pub is_active: bool,
    pub instructor_id: i32,
    pub instructor_name: Option<String>,
}

// 1 cours + ses leçons (page de détail)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseWithInstructor,
    pub lessons: Vec<super::lessons::Model>,
}

// 1 inscription + les infos du cours associé
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentWithCourse {
    pub id: i32,
    pub course_id: i32,
    pub course_title: Option<String>,
    pub cover_image: Option<String>,
    pub progress: i32,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}
