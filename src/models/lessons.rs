use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
#[serde(rename_all = "camelCase")] // Les modèles sortent tels quels en JSON: camelCase côté client
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub position: i32,               // Ordre d'affichage dans le cours
    pub lesson_type: String,         // 'video', 'quiz'
    pub duration_seconds: Option<i32>,
    // Contenu quiz: [{"question": ..., "options": [...], "correct_option": 0}, ...]
    pub quiz_content: Option<Json>,
    // Asset vidéo (rempli de façon asynchrone, une fois l'encodage terminé)
    pub video_id: Option<String>,    // Identifiant chez le provider vidéo
    pub hls_url: Option<String>,
    pub mp4_url: Option<String>,
    pub playback_url: Option<String>,
    pub video_status: Option<String>, // 'pending', 'processing', 'ready', 'failed' (NULL si quiz)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id"
    )]
    Course,

    #[sea_orm(has_many = "super::lesson_access::Entity")]
    LessonAccess,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::lesson_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LessonAccess.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_serializes_in_camel_case() {
        let lesson = Model {
            id: 1,
            course_id: 2,
            title: "Intro".to_string(),
            position: 1,
            lesson_type: "video".to_string(),
            duration_seconds: Some(60),
            quiz_content: None,
            video_id: Some("vi123".to_string()),
            hls_url: None,
            mp4_url: None,
            playback_url: None,
            video_status: Some("pending".to_string()),
        };

        let json = serde_json::to_value(&lesson).unwrap();
        assert!(json.get("lessonType").is_some());
        assert!(json.get("courseId").is_some());
        assert!(json.get("durationSeconds").is_some());
        assert!(json.get("videoStatus").is_some());
        assert!(json.get("lesson_type").is_none());
        assert!(json.get("video_status").is_none());
    }
}
